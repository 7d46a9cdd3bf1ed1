use std::collections::BTreeMap;

use serde_json::Value;

use crate::rbac::catalog::CrdChange;
use crate::rbac::cluster::{DiscoveryFeed, RoleLookup, RoleSink, SpecSource};
use crate::rbac::composer::RuleComposer;
use crate::rbac::errors::RbacError;
use crate::rbac::tracker::WatchedRoles;
use crate::rbac::types::{ComputedRole, DynamicRole, RoleIdentity, RoleObject};
use crate::rbac::EngineContext;

/// Annotation written on every computed role.
pub const MANAGED_BY_ANNOTATION: &str = "managed-by";

/// Outcome of one full recomputation pass.
#[derive(Debug, Default)]
pub struct PassReport {
    pub computed: Vec<ComputedRole>,
    /// Per-specification failures; siblings still ran.
    pub failures: Vec<(String, RbacError)>,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures that may clear up when the pass is run again.
    pub fn transient_failures(&self) -> usize {
        self.failures.iter().filter(|(_, e)| e.is_transient()).count()
    }
}

/// Drives the engine from cluster events: specification changes, changes to
/// inherited roles and CRD changes.
pub struct Reconciler<'a, C> {
    cluster: &'a C,
    ctx: &'a EngineContext,
    managed_by: String,
}

impl<'a, C> Reconciler<'a, C>
where
    C: RoleLookup + RoleSink + SpecSource + DiscoveryFeed,
{
    pub fn new(cluster: &'a C, ctx: &'a EngineContext, managed_by: impl Into<String>) -> Self {
        Self {
            cluster,
            ctx,
            managed_by: managed_by.into(),
        }
    }

    /// Compose one specification and write the result. All-or-nothing: on
    /// error nothing is written. Its inherited roles are added to the
    /// published dependency records.
    pub fn reconcile_spec(&self, spec: &DynamicRole) -> Result<ComputedRole, RbacError> {
        let mut watched = WatchedRoles::new();
        let result = self.compose_and_write(spec, &mut watched);
        self.ctx.tracker.merge(&watched);
        result
    }

    /// The write carries the version of the output role read before
    /// composing, so a concurrent change surfaces as `UpsertConflict`.
    fn compose_and_write(
        &self,
        spec: &DynamicRole,
        watched: &mut WatchedRoles,
    ) -> Result<ComputedRole, RbacError> {
        let identity = spec.output_identity();
        let expected_version = match self.cluster.get_role(&identity) {
            Ok(existing) => existing.resource_version,
            Err(RbacError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let catalog = self.ctx.catalog.snapshot();
        let composer = RuleComposer::new(&catalog, self.cluster);
        let namespace = spec.namespace.as_deref().unwrap_or_default();
        let rules = composer.build(&spec.spec, spec.scope(), namespace, watched)?;

        let owner = spec.owner_reference();
        tracing::info!(spec = %spec, rules = rules.len(), "Computed role");

        let mut annotations = BTreeMap::new();
        annotations.insert(MANAGED_BY_ANNOTATION.to_string(), self.managed_by.clone());
        let object = RoleObject {
            identity: identity.clone(),
            annotations,
            owner: Some(owner.clone()),
            resource_version: expected_version,
            rules: rules.clone(),
        };
        self.cluster.upsert_role(object)?;

        Ok(ComputedRole {
            identity,
            owner,
            rules,
        })
    }

    /// Recompute every specification. Dependency records are rebuilt from
    /// scratch and replace the published ones in one step once every
    /// specification has been tried; one failing specification does not
    /// stop the others. If listing fails the previous records stay.
    pub fn reconcile_all(&self) -> Result<PassReport, RbacError> {
        let specs = self.cluster.list_specs()?;

        let mut watched = WatchedRoles::new();
        let mut report = PassReport::default();
        for spec in &specs {
            match self.compose_and_write(spec, &mut watched) {
                Ok(computed) => report.computed.push(computed),
                Err(e) => {
                    tracing::error!(
                        spec = %spec,
                        error = %e,
                        transient = e.is_transient(),
                        "Failed to reconcile specification"
                    );
                    report.failures.push((spec.to_string(), e));
                }
            }
        }

        let (roles, cluster_roles) = watched.counts();
        self.ctx.tracker.publish(watched);
        tracing::info!(
            computed = report.computed.len(),
            failed = report.failures.len(),
            transient = report.transient_failures(),
            watched_roles = roles,
            watched_cluster_roles = cluster_roles,
            "All computed roles have been reconciled"
        );
        Ok(report)
    }

    /// A concrete Role or ClusterRole changed. Runs a full pass only when some
    /// specification inherits it.
    pub fn on_role_changed(&self, id: &RoleIdentity) -> Result<Option<PassReport>, RbacError> {
        if !self.ctx.tracker.contains(id) {
            return Ok(None);
        }
        tracing::info!(role = %id, "Inherited role changed, reconciling all specifications");
        self.reconcile_all().map(Some)
    }

    /// A CRD was created, updated (`Some`) or deleted (`None`). New, changed
    /// or removed definitions rebuild the catalog and rerun every
    /// specification. The definition is only remembered once the rebuild
    /// succeeded, so a retry after a failed discovery rebuilds again.
    pub fn on_crd_event(
        &self,
        name: &str,
        spec: Option<&Value>,
    ) -> Result<Option<PassReport>, RbacError> {
        let change = self.ctx.classify_crd(name, spec);
        if !change.requires_rebuild() {
            tracing::debug!(crd = name, "CRD unchanged, no reconciliation required");
            return Ok(None);
        }
        match change {
            CrdChange::Removed => tracing::info!(crd = name, "CRD deleted, rebuilding catalog"),
            _ => tracing::info!(crd = name, ?change, "CRD changed, rebuilding catalog"),
        }

        self.refresh_catalog()?;
        let known = self.ctx.commit_crd(name, spec);
        tracing::debug!(crd = name, known_crds = known, "Recorded CRD definition");

        self.reconcile_all().map(Some)
    }

    /// Rebuild the catalog from discovery.
    pub fn refresh_catalog(&self) -> Result<(), RbacError> {
        self.ctx
            .catalog
            .rebuild_from(self.cluster.discover_resources())?;
        Ok(())
    }
}
