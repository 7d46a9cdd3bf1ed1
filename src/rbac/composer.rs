use crate::rbac::catalog::ResourceCatalog;
use crate::rbac::cluster::RoleLookup;
use crate::rbac::errors::RbacError;
use crate::rbac::expander::{expand, NonResourceUrls};
use crate::rbac::index::PolicyIndex;
use crate::rbac::tracker::WatchedRoles;
use crate::rbac::types::{
    InheritedRoleRef, PolicyKey, RoleIdentity, RoleKind, RoleSpecification, Rule, WILDCARD,
};

/// Turns a role specification into a concrete, canonical rule list.
///
/// Holds no state of its own between calls; each `build` works on a fresh
/// `PolicyIndex` and records inherited identities into the caller's
/// [`WatchedRoles`].
pub struct RuleComposer<'a, L: RoleLookup + ?Sized> {
    catalog: &'a ResourceCatalog,
    roles: &'a L,
}

impl<'a, L: RoleLookup + ?Sized> RuleComposer<'a, L> {
    pub fn new(catalog: &'a ResourceCatalog, roles: &'a L) -> Self {
        Self { catalog, roles }
    }

    /// Compose `spec` for a role of kind `scope` living in `namespace`
    /// (empty for cluster scope).
    ///
    /// Order: inherited roles are unioned, then `deny` is subtracted, then
    /// `allow` is merged. Explicit allow rules are therefore never filtered by
    /// the same specification's deny list.
    pub fn build(
        &self,
        spec: &RoleSpecification,
        scope: RoleKind,
        namespace: &str,
        watched: &mut WatchedRoles,
    ) -> Result<Vec<Rule>, RbacError> {
        Ok(self.compose(spec, scope, namespace, watched)?.to_rules())
    }

    pub fn compose(
        &self,
        spec: &RoleSpecification,
        scope: RoleKind,
        namespace: &str,
        watched: &mut WatchedRoles,
    ) -> Result<PolicyIndex, RbacError> {
        // Resolve every reference before touching the cluster or the catalog.
        let inherited = spec
            .inherit
            .iter()
            .map(|r| resolve_reference(r, scope, namespace))
            .collect::<Result<Vec<_>, _>>()?;

        let mut index = PolicyIndex::new();

        for id in &inherited {
            watched.record(id);
            let role = self.roles.get_role(id)?;

            let urls = if scope == RoleKind::Role && id.kind == RoleKind::ClusterRole {
                NonResourceUrls::Drop
            } else {
                NonResourceUrls::Keep
            };
            let rules = expand(&role.rules, self.catalog, urls);
            tracing::debug!(role = %id, rules = rules.len(), "inherited rules");
            index.merge(PolicyIndex::from_rules(&rules));
        }

        if let Some(deny) = &spec.deny {
            apply_deny(&mut index, deny);
        }

        if let Some(allow) = &spec.allow {
            let urls = match scope {
                RoleKind::Role => NonResourceUrls::Drop,
                RoleKind::ClusterRole => NonResourceUrls::Keep,
            };
            let rules = expand(allow, self.catalog, urls);
            index.merge(PolicyIndex::from_rules(&rules));
        }

        Ok(index)
    }
}

/// Concrete identity of an inherited reference, or a validation error when
/// a cluster-scoped specification names a Role without a namespace.
pub fn resolve_reference(
    reference: &InheritedRoleRef,
    scope: RoleKind,
    namespace: &str,
) -> Result<RoleIdentity, RbacError> {
    match reference.kind {
        RoleKind::ClusterRole => Ok(RoleIdentity::cluster_role(reference.name.clone())),
        RoleKind::Role => {
            let ns = match (&reference.namespace, scope) {
                (Some(ns), _) if !ns.is_empty() => ns.clone(),
                (_, RoleKind::ClusterRole) => {
                    return Err(RbacError::Validation(format!(
                        "cluster-scoped specification inherits Role `{}` without a namespace",
                        reference.name
                    )));
                }
                (_, RoleKind::Role) => namespace.to_string(),
            };
            Ok(RoleIdentity::role(ns, reference.name.clone()))
        }
    }
}

/// Subtract every applicable deny rule from the index.
pub fn apply_deny(index: &mut PolicyIndex, deny: &[Rule]) {
    let keys: Vec<PolicyKey> = index.keys().cloned().collect();
    for key in keys {
        for rule in deny {
            if !deny_applies(rule, &key) {
                continue;
            }
            if rule.has_verb_wildcard() {
                index.remove(&key);
                break;
            }
            index.subtract_verbs(&key, &rule.verbs);
            if index.get(&key).is_none() {
                break;
            }
        }
    }
}

/// Whether `deny` covers the dimension `key`.
pub fn deny_applies(deny: &Rule, key: &PolicyKey) -> bool {
    let any_group = deny.has_group_wildcard();
    let any_resource = deny.has_resource_wildcard();

    if any_group && any_resource {
        return true;
    }

    if let Some(url) = &key.non_resource_url {
        return deny
            .non_resource_urls
            .iter()
            .any(|u| u == WILDCARD || u == url);
    }

    let group_hit = deny.api_groups.contains(&key.api_group);
    let resource_hit = deny.resources.contains(&key.resource);

    (any_group && resource_hit) || (any_resource && group_hit) || (group_hit && resource_hit)
}
