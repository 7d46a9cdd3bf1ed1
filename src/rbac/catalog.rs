use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::rbac::errors::RbacError;
use crate::rbac::types::{DiscoveredResource, WILDCARD};

/// One resource type known to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Empty for the core group.
    pub api_group: String,
    pub resource: String,
    pub verbs: BTreeSet<String>,
}

/// Every (group, resource) pair the cluster serves, with its verbs.
///
/// Immutable once built; a CRD change produces a new catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ResourceCatalog {
    /// Build from raw discovery rows. Versions of the same (group, resource)
    /// collapse into one entry with the union of their verbs.
    pub fn from_discovery(resources: &[DiscoveredResource]) -> Self {
        let mut merged: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

        for res in resources {
            let group = api_group_of(&res.group_version).to_string();
            let verbs = merged.entry((group, res.resource.clone())).or_default();
            if res.verbs.is_empty() {
                verbs.insert(WILDCARD.to_string());
            } else {
                verbs.extend(res.verbs.iter().cloned());
            }
        }

        let entries = merged
            .into_iter()
            .map(|((api_group, resource), verbs)| CatalogEntry {
                api_group,
                resource,
                verbs,
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn with_resource<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries.iter().filter(move |e| e.resource == resource)
    }

    pub fn in_group<'a>(&'a self, api_group: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries.iter().filter(move |e| e.api_group == api_group)
    }

    pub fn get(&self, api_group: &str, resource: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.api_group == api_group && e.resource == resource)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Group part of a discovery `groupVersion`. A bare version such as `v1`
/// belongs to the core group, which RBAC spells as the empty string.
pub fn api_group_of(group_version: &str) -> &str {
    match group_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}

/// Process-wide catalog handle. Readers take a snapshot; a rebuild swaps the
/// whole catalog so no reader ever sees a half-built one.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    current: ArcSwap<ResourceCatalog>,
}

impl SharedCatalog {
    pub fn new(catalog: ResourceCatalog) -> Self {
        Self {
            current: ArcSwap::from_pointee(catalog),
        }
    }

    pub fn snapshot(&self) -> Arc<ResourceCatalog> {
        self.current.load_full()
    }

    /// Replace the catalog with one built from `discovered`.
    pub fn rebuild(&self, discovered: &[DiscoveredResource]) -> Arc<ResourceCatalog> {
        let catalog = Arc::new(ResourceCatalog::from_discovery(discovered));
        self.current.store(Arc::clone(&catalog));
        tracing::info!(entries = catalog.len(), "Rebuilt resource catalog");
        catalog
    }

    /// Rebuild from a discovery attempt. On failure the previous snapshot
    /// stays in effect and `CatalogUnavailable` is returned.
    pub fn rebuild_from<E: std::fmt::Display>(
        &self,
        discovered: Result<Vec<DiscoveredResource>, E>,
    ) -> Result<Arc<ResourceCatalog>, RbacError> {
        match discovered {
            Ok(resources) => Ok(self.rebuild(&resources)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    entries = self.current.load().len(),
                    "Discovery failed, keeping previous resource catalog"
                );
                Err(RbacError::CatalogUnavailable(e.to_string()))
            }
        }
    }
}

// serde_json maps are ordered, so equal specs give equal strings
fn fingerprint(spec: &Value) -> String {
    spec.to_string()
}

/// What a CRD event means for the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrdChange {
    Added,
    Changed,
    Removed,
    Unchanged,
}

impl CrdChange {
    pub fn requires_rebuild(&self) -> bool {
        !matches!(self, CrdChange::Unchanged)
    }
}

/// Remembers the last seen definition of every CRD so that repeated events
/// for an unchanged definition do not trigger a rebuild.
#[derive(Debug, Default)]
pub struct CrdRegistry {
    seen: HashMap<String, String>,
}

impl CrdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an event for `name` against the last committed definition;
    /// `None` means the CRD was deleted. Does not modify the registry.
    pub fn classify(&self, name: &str, spec: Option<&Value>) -> CrdChange {
        let previous = self.seen.get(name);
        match (spec, previous) {
            (None, Some(_)) => CrdChange::Removed,
            (None, None) => CrdChange::Unchanged,
            (Some(_), None) => CrdChange::Added,
            (Some(spec), Some(previous)) if fingerprint(spec) == *previous => CrdChange::Unchanged,
            (Some(_), Some(_)) => CrdChange::Changed,
        }
    }

    /// Remember `spec` as the current definition of `name`. Only called
    /// once the catalog reflects it.
    pub fn commit(&mut self, name: &str, spec: Option<&Value>) {
        match spec {
            Some(spec) => {
                self.seen.insert(name.to_string(), fingerprint(spec));
            }
            None => {
                self.seen.remove(name);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
