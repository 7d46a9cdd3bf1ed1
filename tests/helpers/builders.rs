use std::collections::BTreeSet;

use dynrole::rbac::catalog::ResourceCatalog;
use dynrole::rbac::cluster::InMemoryCluster;
use dynrole::rbac::types::{
    DiscoveredResource, DynamicRole, InheritedRoleRef, RoleIdentity, RoleObject,
    RoleSpecification, Rule,
};

/// Discovery feed for the two-entry catalog used by most scenarios:
/// core `pods` with five verbs and `apps/deployments` with two.
pub fn standard_discovery() -> Vec<DiscoveredResource> {
    vec![
        DiscoveredResource::new("v1", "pods", ["get", "list", "watch", "create", "delete"]),
        DiscoveredResource::new("apps/v1", "deployments", ["get", "list"]),
    ]
}

pub fn standard_catalog() -> ResourceCatalog {
    ResourceCatalog::from_discovery(&standard_discovery())
}

pub fn verb_set(rule: &Rule) -> BTreeSet<&str> {
    rule.verbs.iter().map(String::as_str).collect()
}

/// Builder for dynamic role specifications
pub struct SpecBuilder {
    name: String,
    namespace: Option<String>,
    spec: RoleSpecification,
}

impl SpecBuilder {
    pub fn cluster(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            spec: RoleSpecification::default(),
        }
    }

    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            spec: RoleSpecification::default(),
        }
    }

    pub fn inherit_cluster_role(mut self, name: &str) -> Self {
        self.spec.inherit.push(InheritedRoleRef::cluster_role(name));
        self
    }

    pub fn inherit_role(mut self, name: &str, namespace: Option<&str>) -> Self {
        self.spec.inherit.push(InheritedRoleRef::role(name, namespace));
        self
    }

    pub fn allow(mut self, rule: Rule) -> Self {
        self.spec.allow.get_or_insert_with(Vec::new).push(rule);
        self
    }

    pub fn deny(mut self, rule: Rule) -> Self {
        self.spec.deny.get_or_insert_with(Vec::new).push(rule);
        self
    }

    pub fn spec(&self) -> &RoleSpecification {
        &self.spec
    }

    pub fn build(self) -> DynamicRole {
        DynamicRole {
            name: self.name,
            namespace: self.namespace,
            spec: self.spec,
        }
    }
}

/// Builder for an in-memory cluster seeded with roles, specifications and
/// a discovery feed.
pub struct ClusterBuilder {
    discovery: Vec<DiscoveredResource>,
    roles: Vec<RoleObject>,
    specs: Vec<DynamicRole>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self {
            discovery: standard_discovery(),
            roles: Vec::new(),
            specs: Vec::new(),
        }
    }

    pub fn with_discovery(mut self, discovery: Vec<DiscoveredResource>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_cluster_role(mut self, name: &str, rules: Vec<Rule>) -> Self {
        self.roles
            .push(RoleObject::new(RoleIdentity::cluster_role(name), rules));
        self
    }

    pub fn with_role(mut self, namespace: &str, name: &str, rules: Vec<Rule>) -> Self {
        self.roles
            .push(RoleObject::new(RoleIdentity::role(namespace, name), rules));
        self
    }

    pub fn with_spec(mut self, spec: DynamicRole) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self) -> InMemoryCluster {
        let cluster = InMemoryCluster::new();
        cluster.set_discovery(self.discovery);
        for role in self.roles {
            cluster.put_role(role);
        }
        for spec in self.specs {
            cluster.put_spec(spec);
        }
        cluster
    }
}
