use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::rbac::types::{RoleIdentity, RoleKind};

/// Concrete roles referenced by specifications' `inherit` lists.
///
/// A full pass records into its own fresh set; the set only becomes visible
/// once published through [`DependencyTracker`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchedRoles {
    /// (namespace, name)
    roles: HashSet<(String, String)>,
    cluster_roles: HashSet<String>,
}

impl WatchedRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, role: &RoleIdentity) {
        match role.kind {
            RoleKind::Role => {
                self.roles.insert((
                    role.namespace.clone().unwrap_or_default(),
                    role.name.clone(),
                ));
            }
            RoleKind::ClusterRole => {
                self.cluster_roles.insert(role.name.clone());
            }
        }
    }

    pub fn contains(&self, role: &RoleIdentity) -> bool {
        match role.kind {
            RoleKind::Role => self.roles.contains(&(
                role.namespace.clone().unwrap_or_default(),
                role.name.clone(),
            )),
            RoleKind::ClusterRole => self.cluster_roles.contains(&role.name),
        }
    }

    /// Add every record of `other`.
    pub fn extend(&mut self, other: &WatchedRoles) {
        self.roles.extend(other.roles.iter().cloned());
        self.cluster_roles.extend(other.cluster_roles.iter().cloned());
    }

    /// (namespaced roles, cluster roles)
    pub fn counts(&self) -> (usize, usize) {
        (self.roles.len(), self.cluster_roles.len())
    }
}

/// Published dependency records. Readers always see one whole
/// [`WatchedRoles`]: the one before a pass or the one after it.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    current: ArcSwap<WatchedRoles>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records with those of a completed pass.
    pub fn publish(&self, watched: WatchedRoles) {
        self.current.store(Arc::new(watched));
    }

    /// Add records of a single composition to the published set.
    pub fn merge(&self, watched: &WatchedRoles) {
        self.current.rcu(|current| {
            let mut next = WatchedRoles::clone(current);
            next.extend(watched);
            next
        });
    }

    pub fn contains(&self, role: &RoleIdentity) -> bool {
        self.current.load().contains(role)
    }

    /// (namespaced roles, cluster roles) currently watched.
    pub fn counts(&self) -> (usize, usize) {
        self.current.load().counts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_contains_by_scope() {
        let mut watched = WatchedRoles::new();
        watched.record(&RoleIdentity::role("team-a", "editor"));
        watched.record(&RoleIdentity::cluster_role("viewer"));

        assert!(watched.contains(&RoleIdentity::role("team-a", "editor")));
        assert!(!watched.contains(&RoleIdentity::role("team-b", "editor")));
        assert!(watched.contains(&RoleIdentity::cluster_role("viewer")));
        // same name, other scope
        assert!(!watched.contains(&RoleIdentity::cluster_role("editor")));
        assert_eq!(watched.counts(), (1, 1));
    }

    #[test]
    fn test_records_invisible_until_published() {
        let tracker = DependencyTracker::new();
        let mut watched = WatchedRoles::new();
        watched.record(&RoleIdentity::cluster_role("viewer"));
        assert!(!tracker.contains(&RoleIdentity::cluster_role("viewer")));

        tracker.publish(watched);
        assert!(tracker.contains(&RoleIdentity::cluster_role("viewer")));
    }

    #[test]
    fn test_publish_replaces_previous_pass() {
        let tracker = DependencyTracker::new();
        let mut first = WatchedRoles::new();
        first.record(&RoleIdentity::role("team-a", "editor"));
        tracker.publish(first);

        let mut second = WatchedRoles::new();
        second.record(&RoleIdentity::cluster_role("viewer"));
        tracker.publish(second);

        assert!(!tracker.contains(&RoleIdentity::role("team-a", "editor")));
        assert_eq!(tracker.counts(), (0, 1));
    }

    #[test]
    fn test_merge_keeps_existing_records() {
        let tracker = DependencyTracker::new();
        let mut first = WatchedRoles::new();
        first.record(&RoleIdentity::cluster_role("viewer"));
        tracker.publish(first);

        let mut single = WatchedRoles::new();
        single.record(&RoleIdentity::role("team-a", "deployer"));
        tracker.merge(&single);

        assert!(tracker.contains(&RoleIdentity::cluster_role("viewer")));
        assert!(tracker.contains(&RoleIdentity::role("team-a", "deployer")));
    }

    #[test]
    fn test_readers_never_see_partial_set() {
        let tracker = DependencyTracker::new();
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..50 {
                    let mut watched = WatchedRoles::new();
                    for i in 0..20 {
                        watched.record(&RoleIdentity::cluster_role(format!("r{i}")));
                    }
                    tracker.publish(watched);
                }
            });
            s.spawn(|| {
                for _ in 0..200 {
                    let (_, cluster_roles) = tracker.counts();
                    assert!(cluster_roles == 0 || cluster_roles == 20);
                }
            });
        });
        assert_eq!(tracker.counts(), (0, 20));
    }
}
