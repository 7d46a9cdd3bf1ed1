use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Token that matches every value of a rule dimension.
pub const WILDCARD: &str = "*";

/// A single permission statement, in the shape the cluster's RBAC API uses.
///
/// A raw rule may list several groups/resources and may use [`WILDCARD`].
/// A canonical rule carries exactly one value per dimension it uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
    #[serde(
        default,
        rename = "nonResourceURLs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub non_resource_urls: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl Rule {
    /// Resource rule over the given groups and resources.
    pub fn resource<G, R, V>(api_groups: G, resources: R, verbs: V) -> Self
    where
        G: IntoIterator,
        G::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            api_groups: api_groups.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            verbs: verbs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Cluster-scoped rule over URL path patterns.
    pub fn non_resource<U, V>(urls: U, verbs: V) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            non_resource_urls: urls.into_iter().map(Into::into).collect(),
            verbs: verbs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_resource_names<N>(mut self, names: N) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
    {
        self.resource_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_non_resource(&self) -> bool {
        !self.non_resource_urls.is_empty()
    }

    pub fn has_group_wildcard(&self) -> bool {
        self.api_groups.iter().any(|g| g == WILDCARD)
    }

    pub fn has_resource_wildcard(&self) -> bool {
        self.resources.iter().any(|r| r == WILDCARD)
    }

    pub fn has_verb_wildcard(&self) -> bool {
        self.verbs.iter().any(|v| v == WILDCARD)
    }

    /// True when every dimension in use holds exactly one value.
    pub fn is_canonical(&self) -> bool {
        if self.is_non_resource() {
            return self.non_resource_urls.len() == 1
                && self.api_groups.is_empty()
                && self.resources.is_empty();
        }
        self.api_groups.len() == 1 && self.resources.len() == 1 && self.resource_names.len() <= 1
    }
}

/// Identity of one canonical permission dimension.
///
/// Resource entries leave `non_resource_url` empty; URL entries leave the
/// group and resource empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyKey {
    pub api_group: String,
    pub resource: String,
    pub resource_name: Option<String>,
    pub non_resource_url: Option<String>,
}

impl PolicyKey {
    pub fn resource(api_group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            api_group: api_group.into(),
            resource: resource.into(),
            resource_name: None,
            non_resource_url: None,
        }
    }

    pub fn non_resource(url: impl Into<String>) -> Self {
        Self {
            api_group: String::new(),
            resource: String::new(),
            resource_name: None,
            non_resource_url: Some(url.into()),
        }
    }

    pub fn is_non_resource(&self) -> bool {
        self.non_resource_url.is_some()
    }

    /// Every key a (possibly multi-valued) rule covers. A canonical rule
    /// yields exactly one key.
    pub fn all_of(rule: &Rule) -> Vec<PolicyKey> {
        if rule.is_non_resource() {
            return rule
                .non_resource_urls
                .iter()
                .map(PolicyKey::non_resource)
                .collect();
        }

        let names: Vec<Option<&String>> = if rule.resource_names.is_empty() {
            vec![None]
        } else {
            rule.resource_names.iter().map(Some).collect()
        };

        let mut keys = Vec::new();
        for group in &rule.api_groups {
            for resource in &rule.resources {
                for &name in &names {
                    keys.push(PolicyKey {
                        api_group: group.clone(),
                        resource: resource.clone(),
                        resource_name: name.cloned(),
                        non_resource_url: None,
                    });
                }
            }
        }
        keys
    }

    /// Canonical rule for this key with the given verbs.
    pub fn to_rule<I>(&self, verbs: I) -> Rule
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let verbs = verbs.into_iter().map(Into::into).collect();
        match &self.non_resource_url {
            Some(url) => Rule {
                non_resource_urls: vec![url.clone()],
                verbs,
                ..Default::default()
            },
            None => Rule {
                api_groups: vec![self.api_group.clone()],
                resources: vec![self.resource.clone()],
                resource_names: self.resource_name.iter().cloned().collect(),
                verbs,
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(url) = &self.non_resource_url {
            return write!(f, "url:{url}");
        }
        let group = if self.api_group.is_empty() {
            "core"
        } else {
            &self.api_group
        };
        write!(f, "{group}/{}", self.resource)?;
        if let Some(name) = &self.resource_name {
            write!(f, "#{name}")?;
        }
        Ok(())
    }
}

/// Scope of a concrete role object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleKind {
    Role,
    ClusterRole,
}

impl RoleKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Role" => Some(Self::Role),
            "ClusterRole" => Some(Self::ClusterRole),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "Role",
            Self::ClusterRole => "ClusterRole",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope-qualified identity of a concrete role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleIdentity {
    pub kind: RoleKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl RoleIdentity {
    pub fn role(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: RoleKind::Role,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            kind: RoleKind::ClusterRole,
            name: name.into(),
            namespace: None,
        }
    }
}

impl fmt::Display for RoleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Link from an output role back to the specification that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

/// A concrete Role or ClusterRole as stored in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleObject {
    #[serde(flatten)]
    pub identity: RoleIdentity,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerReference>,
    /// Expected version on write, current version on read. `None` on write
    /// means "overwrite whatever is there".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<u64>,
    pub rules: Vec<Rule>,
}

impl RoleObject {
    pub fn new(identity: RoleIdentity, rules: Vec<Rule>) -> Self {
        Self {
            identity,
            annotations: BTreeMap::new(),
            owner: None,
            resource_version: None,
            rules,
        }
    }
}

/// An `inherit` entry of a role specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedRoleRef {
    pub name: String,
    pub kind: RoleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl InheritedRoleRef {
    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RoleKind::ClusterRole,
            namespace: None,
        }
    }

    pub fn role(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: RoleKind::Role,
            namespace: namespace.map(str::to_string),
        }
    }
}

/// Declarative description of a computed role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpecification {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherit: Vec<InheritedRoleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<Rule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<Rule>>,
}

/// A stored specification: identity plus body. A namespace makes it a
/// `DynamicRole`, its absence a `DynamicClusterRole`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRole {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub spec: RoleSpecification,
}

impl DynamicRole {
    pub fn scope(&self) -> RoleKind {
        if self.namespace.is_some() {
            RoleKind::Role
        } else {
            RoleKind::ClusterRole
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.scope() {
            RoleKind::Role => "DynamicRole",
            RoleKind::ClusterRole => "DynamicClusterRole",
        }
    }

    /// Identity of the concrete role this specification produces.
    pub fn output_identity(&self) -> RoleIdentity {
        RoleIdentity {
            kind: self.scope(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            kind: self.kind_name().to_string(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for DynamicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind_name(), ns, self.name),
            None => write!(f, "{}/{}", self.kind_name(), self.name),
        }
    }
}

/// One row of the cluster's discovery output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredResource {
    pub group_version: String,
    pub resource: String,
    #[serde(default)]
    pub verbs: Vec<String>,
}

impl DiscoveredResource {
    pub fn new<V>(group_version: &str, resource: &str, verbs: V) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        Self {
            group_version: group_version.to_string(),
            resource: resource.to_string(),
            verbs: verbs.into_iter().map(Into::into).collect(),
        }
    }
}

/// Engine output for one specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedRole {
    pub identity: RoleIdentity,
    pub owner: OwnerReference,
    pub rules: Vec<Rule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_wildcards() {
        let r = Rule::resource(["*"], ["pods"], ["get"]);
        assert!(r.has_group_wildcard());
        assert!(!r.has_resource_wildcard());
        assert!(!r.has_verb_wildcard());
        assert!(!r.is_non_resource());
    }

    #[test]
    fn test_rule_is_canonical() {
        assert!(Rule::resource([""], ["pods"], ["get"]).is_canonical());
        assert!(!Rule::resource([""], ["pods", "services"], ["get"]).is_canonical());
        assert!(!Rule::resource(["", "apps"], ["pods"], ["get"]).is_canonical());
        assert!(Rule::non_resource(["/healthz"], ["get"]).is_canonical());
        assert!(!Rule::non_resource(["/healthz", "/metrics"], ["get"]).is_canonical());
    }

    #[test]
    fn test_policy_keys_cross_product() {
        let r = Rule::resource(["", "apps"], ["pods", "deployments"], ["get"])
            .with_resource_names(["a"]);
        let keys = PolicyKey::all_of(&r);
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| k.resource_name.as_deref() == Some("a")));
    }

    #[test]
    fn test_policy_key_round_trips_to_canonical_rule() {
        let key = PolicyKey::resource("apps", "deployments");
        let rule = key.to_rule(["get"]);
        assert!(rule.is_canonical());
        assert_eq!(PolicyKey::all_of(&rule), vec![key]);

        let url = PolicyKey::non_resource("/healthz");
        assert_eq!(url.to_rule(["get"]).non_resource_urls, vec!["/healthz"]);
    }

    #[test]
    fn test_rule_serde_uses_rbac_field_names() {
        let r = Rule::non_resource(["/metrics"], ["get"]);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["nonResourceURLs"][0], "/metrics");
        assert!(json.get("apiGroups").is_none());

        let parsed: Rule =
            serde_json::from_str(r#"{"apiGroups":[""],"resources":["pods"],"verbs":["get"]}"#)
                .unwrap();
        assert_eq!(parsed, Rule::resource([""], ["pods"], ["get"]));
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(
            RoleIdentity::role("team-a", "editor").to_string(),
            "Role/team-a/editor"
        );
        assert_eq!(
            RoleIdentity::cluster_role("viewer").to_string(),
            "ClusterRole/viewer"
        );
        assert_eq!(PolicyKey::resource("", "pods").to_string(), "core/pods");
    }

    #[test]
    fn test_dynamic_role_scope() {
        let namespaced = DynamicRole {
            name: "dev".into(),
            namespace: Some("team-a".into()),
            spec: RoleSpecification::default(),
        };
        assert_eq!(namespaced.scope(), RoleKind::Role);
        assert_eq!(namespaced.owner_reference().kind, "DynamicRole");
        assert_eq!(
            namespaced.output_identity(),
            RoleIdentity::role("team-a", "dev")
        );

        let cluster = DynamicRole {
            name: "ops".into(),
            namespace: None,
            spec: RoleSpecification::default(),
        };
        assert_eq!(cluster.scope(), RoleKind::ClusterRole);
        assert_eq!(cluster.kind_name(), "DynamicClusterRole");
    }
}
