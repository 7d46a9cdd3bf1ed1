use std::sync::atomic::{AtomicBool, Ordering};

use dynrole::rbac::cluster::{DiscoveryFeed, InMemoryCluster, RoleLookup, RoleSink, SpecSource};
use dynrole::rbac::errors::RbacError;
use dynrole::rbac::types::{DiscoveredResource, DynamicRole, RoleIdentity, RoleObject};

/// In-memory cluster whose discovery and specification listing can be
/// switched to fail.
pub struct FlakyCluster {
    pub inner: InMemoryCluster,
    fail_discovery: AtomicBool,
    fail_listing: AtomicBool,
}

impl FlakyCluster {
    pub fn new(inner: InMemoryCluster) -> Self {
        Self {
            inner,
            fail_discovery: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
        }
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }
}

impl RoleLookup for FlakyCluster {
    fn get_role(&self, id: &RoleIdentity) -> Result<RoleObject, RbacError> {
        self.inner.get_role(id)
    }
}

impl RoleSink for FlakyCluster {
    fn upsert_role(&self, role: RoleObject) -> Result<RoleObject, RbacError> {
        self.inner.upsert_role(role)
    }
}

impl SpecSource for FlakyCluster {
    fn list_specs(&self) -> Result<Vec<DynamicRole>, RbacError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(RbacError::Backend("listing specifications timed out".into()));
        }
        self.inner.list_specs()
    }
}

impl DiscoveryFeed for FlakyCluster {
    fn discover_resources(&self) -> Result<Vec<DiscoveredResource>, RbacError> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(RbacError::Backend("discovery timed out".into()));
        }
        self.inner.discover_resources()
    }
}
