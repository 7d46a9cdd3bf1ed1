pub mod catalog;
pub mod cluster;
pub mod composer;
pub mod errors;
pub mod expander;
pub mod index;
pub mod loader;
pub mod policy;
pub mod reconcile;
pub mod tracker;
pub mod types;

use std::sync::{Mutex, PoisonError};

use catalog::{CrdChange, CrdRegistry, ResourceCatalog, SharedCatalog};
use serde_json::Value;
use tracker::DependencyTracker;

/// Shared engine state: the resource catalog, the dependency records and
/// the CRD registry. Owned by the caller and passed by reference to every
/// composition, so independent contexts never interfere.
#[derive(Debug, Default)]
pub struct EngineContext {
    pub catalog: SharedCatalog,
    pub tracker: DependencyTracker,
    crds: Mutex<CrdRegistry>,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: ResourceCatalog) -> Self {
        Self {
            catalog: SharedCatalog::new(catalog),
            ..Default::default()
        }
    }

    pub(crate) fn classify_crd(&self, name: &str, spec: Option<&Value>) -> CrdChange {
        let crds = self.crds.lock().unwrap_or_else(PoisonError::into_inner);
        crds.classify(name, spec)
    }

    /// Commit a CRD definition once the catalog reflects it; returns the
    /// number of known CRDs.
    pub(crate) fn commit_crd(&self, name: &str, spec: Option<&Value>) -> usize {
        let mut crds = self.crds.lock().unwrap_or_else(PoisonError::into_inner);
        crds.commit(name, spec);
        crds.len()
    }
}
