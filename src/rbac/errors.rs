use miette::Diagnostic;
use thiserror::Error;

use crate::rbac::types::RoleIdentity;

#[derive(Debug, Error, Diagnostic)]
pub enum RbacError {
    #[error("Inherited role `{0}` does not exist")]
    #[diagnostic(
        code(dynrole::rbac::not_found),
        help("Create the referenced role or remove it from the `inherit` list")
    )]
    NotFound(RoleIdentity),

    #[error("Invalid role specification: {0}")]
    #[diagnostic(
        code(dynrole::rbac::validation),
        help("A cluster-scoped specification must give an explicit namespace for every inherited Role")
    )]
    Validation(String),

    #[error("Resource catalog unavailable: {0}")]
    #[diagnostic(
        code(dynrole::rbac::catalog_unavailable),
        help("Discovery failed; the previous catalog snapshot stays in effect until a rebuild succeeds")
    )]
    CatalogUnavailable(String),

    #[error("Concurrent modification of `{0}`")]
    #[diagnostic(
        code(dynrole::rbac::upsert_conflict),
        help("Recompose the specification and retry the write")
    )]
    UpsertConflict(RoleIdentity),

    #[error("Cluster backend error: {0}")]
    #[diagnostic(code(dynrole::rbac::backend))]
    Backend(String),

    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(dynrole::rbac::policy_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    PolicyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy: {0}")]
    #[diagnostic(
        code(dynrole::rbac::invalid_policy),
        help("Top-level nodes are `role`, `cluster-role`, `api-resources`, `dynamic-role` and `dynamic-cluster-role`")
    )]
    InvalidPolicy(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(dynrole::rbac::kdl_parse),
        help("Check your KDL file syntax (see https://kdl.dev)")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(dynrole::rbac::io))]
    Io(#[from] std::io::Error),
}

impl RbacError {
    /// Errors worth retrying the whole compose-and-write cycle for.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RbacError::UpsertConflict(_) | RbacError::CatalogUnavailable(_) | RbacError::Backend(_)
        )
    }
}
