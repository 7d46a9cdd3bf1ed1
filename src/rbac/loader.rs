use std::path::Path;

use crate::rbac::cluster::InMemoryCluster;
use crate::rbac::errors::RbacError;
use crate::rbac::policy::{parse_kdl_document, ParsedManifest};

/// Load all `.kdl` manifests from the given directory into an in-memory
/// cluster. Files are read in path order; a later definition of the same
/// role or specification replaces an earlier one.
pub fn load_cluster(dir: &Path) -> Result<InMemoryCluster, RbacError> {
    if !dir.is_dir() {
        return Err(RbacError::InvalidPolicy(format!(
            "policies directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut all_parsed = Vec::new();
    for entry in &entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| RbacError::PolicyLoadError {
                path: path.display().to_string(),
                source,
            })?;
        all_parsed.push(parse_kdl_document(&contents)?);
    }

    let cluster = build_cluster(all_parsed);
    tracing::info!(
        files = entries.len(),
        roles = cluster.roles().len(),
        "Loaded role manifests"
    );
    Ok(cluster)
}

/// Merge parsed manifests into one in-memory cluster.
pub fn build_cluster(parsed: Vec<ParsedManifest>) -> InMemoryCluster {
    let cluster = InMemoryCluster::new();
    let mut discovery = Vec::new();

    for manifest in parsed {
        for role in manifest.roles {
            cluster.put_role(role);
        }
        for spec in manifest.specs {
            cluster.put_spec(spec);
        }
        discovery.extend(manifest.discovery);
    }

    cluster.set_discovery(discovery);
    cluster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::cluster::{DiscoveryFeed, RoleLookup, SpecSource};
    use crate::rbac::types::{DynamicRole, RoleIdentity, RoleObject, RoleSpecification, Rule};

    #[test]
    fn test_later_manifest_wins() {
        let first = ParsedManifest {
            roles: vec![RoleObject::new(
                RoleIdentity::cluster_role("viewer"),
                vec![Rule::resource([""], ["pods"], ["get"])],
            )],
            ..Default::default()
        };
        let second = ParsedManifest {
            roles: vec![RoleObject::new(
                RoleIdentity::cluster_role("viewer"),
                vec![Rule::resource([""], ["pods"], ["get", "list"])],
            )],
            specs: vec![DynamicRole {
                name: "ops".into(),
                namespace: None,
                spec: RoleSpecification::default(),
            }],
            ..Default::default()
        };

        let cluster = build_cluster(vec![first, second]);
        let viewer = cluster
            .get_role(&RoleIdentity::cluster_role("viewer"))
            .unwrap();
        assert_eq!(viewer.rules[0].verbs, vec!["get", "list"]);
        assert_eq!(cluster.list_specs().unwrap().len(), 1);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("discovery.kdl"),
            r#"
api-resources "v1" {
    resource "pods" {
        verbs {
            - "get"
            - "list"
        }
    }
}
api-resources "apps/v1" {
    resource "deployments" {
        verbs {
            - "get"
        }
    }
}
"#,
        )
        .unwrap();

        std::fs::write(
            dir.path().join("roles.kdl"),
            r#"
cluster-role "viewer" {
    rule {
        api-groups {
            - ""
        }
        resources {
            - "pods"
        }
        verbs {
            - "get"
        }
    }
}

dynamic-cluster-role "ops" {
    inherit {
        - "viewer" kind="ClusterRole"
    }
}
"#,
        )
        .unwrap();

        // Also write a non-KDL file that should be ignored
        std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let cluster = load_cluster(dir.path()).unwrap();
        assert_eq!(cluster.roles().len(), 1);
        assert_eq!(cluster.list_specs().unwrap().len(), 1);
        assert_eq!(cluster.discover_resources().unwrap().len(), 2);
    }

    #[test]
    fn test_load_rejects_invalid_kdl() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.kdl"), "cluster-role \"viewer\" {").unwrap();
        let err = load_cluster(dir.path()).unwrap_err();
        assert!(matches!(err, RbacError::KdlParse(_)));
    }

    #[test]
    fn test_load_nonexistent_directory() {
        let err = load_cluster(Path::new("/nonexistent/path")).unwrap_err();
        assert!(matches!(err, RbacError::InvalidPolicy(_)));
    }
}
