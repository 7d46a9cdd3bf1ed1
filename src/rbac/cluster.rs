//! Boundary to the cluster control plane.
//!
//! The engine only talks to the cluster through these traits. `InMemoryCluster`
//! implements all of them for the CLI and for tests.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::rbac::errors::RbacError;
use crate::rbac::types::{DiscoveredResource, DynamicRole, RoleIdentity, RoleObject};

/// Read access to concrete roles.
pub trait RoleLookup: Send + Sync {
    /// Fails with [`RbacError::NotFound`] when the role does not exist.
    fn get_role(&self, id: &RoleIdentity) -> Result<RoleObject, RbacError>;
}

/// Create-or-update sink for computed roles.
pub trait RoleSink: Send + Sync {
    /// Create the role if absent, otherwise overwrite only its rules.
    /// Returns the stored object.
    fn upsert_role(&self, role: RoleObject) -> Result<RoleObject, RbacError>;
}

/// Every current role specification.
pub trait SpecSource: Send + Sync {
    fn list_specs(&self) -> Result<Vec<DynamicRole>, RbacError>;
}

/// Raw discovery of the cluster's resource types.
pub trait DiscoveryFeed: Send + Sync {
    fn discover_resources(&self) -> Result<Vec<DiscoveredResource>, RbacError>;
}

#[derive(Debug, Default)]
struct ClusterState {
    roles: BTreeMap<RoleIdentity, RoleObject>,
    specs: Vec<DynamicRole>,
    discovery: Vec<DiscoveredResource>,
}

/// Cluster held entirely in memory. Not durable.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: RwLock<ClusterState>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a role as-is, replacing any existing one. Bumps its version.
    pub fn put_role(&self, mut role: RoleObject) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let version = state
            .roles
            .get(&role.identity)
            .and_then(|r| r.resource_version)
            .unwrap_or(0);
        role.resource_version = Some(version + 1);
        state.roles.insert(role.identity.clone(), role);
    }

    pub fn delete_role(&self, id: &RoleIdentity) -> Option<RoleObject> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.roles.remove(id)
    }

    /// Add or replace a specification (matched by name and namespace).
    pub fn put_spec(&self, spec: DynamicRole) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state
            .specs
            .iter_mut()
            .find(|s| s.name == spec.name && s.namespace == spec.namespace)
        {
            Some(existing) => *existing = spec,
            None => state.specs.push(spec),
        }
    }

    pub fn set_discovery(&self, discovery: Vec<DiscoveredResource>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.discovery = discovery;
    }

    pub fn roles(&self) -> Vec<RoleObject> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.roles.values().cloned().collect()
    }
}

impl RoleLookup for InMemoryCluster {
    fn get_role(&self, id: &RoleIdentity) -> Result<RoleObject, RbacError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .roles
            .get(id)
            .cloned()
            .ok_or_else(|| RbacError::NotFound(id.clone()))
    }
}

impl RoleSink for InMemoryCluster {
    fn upsert_role(&self, role: RoleObject) -> Result<RoleObject, RbacError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let Some(found) = state.roles.get_mut(&role.identity) else {
            let mut created = role;
            created.resource_version = Some(1);
            state
                .roles
                .insert(created.identity.clone(), created.clone());
            tracing::debug!(role = %created.identity, "created role");
            return Ok(created);
        };

        if let Some(expected) = role.resource_version {
            if found.resource_version != Some(expected) {
                return Err(RbacError::UpsertConflict(role.identity));
            }
        }

        if found.rules != role.rules {
            found.rules = role.rules;
            found.resource_version = Some(found.resource_version.unwrap_or(0) + 1);
            tracing::debug!(role = %found.identity, "updated role rules");
        }
        Ok(found.clone())
    }
}

impl SpecSource for InMemoryCluster {
    fn list_specs(&self) -> Result<Vec<DynamicRole>, RbacError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.specs.clone())
    }
}

impl DiscoveryFeed for InMemoryCluster {
    fn discover_resources(&self) -> Result<Vec<DiscoveredResource>, RbacError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.discovery.clone())
    }
}
