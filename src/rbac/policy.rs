use crate::rbac::errors::RbacError;
use crate::rbac::types::*;
use kdl::{KdlDocument, KdlNode};

/// Intermediate result from parsing a single KDL manifest.
#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    pub roles: Vec<RoleObject>,
    pub discovery: Vec<DiscoveredResource>,
    pub specs: Vec<DynamicRole>,
}

/// Parse a KDL document string into roles, discovery rows and specifications.
pub fn parse_kdl_document(source: &str) -> Result<ParsedManifest, RbacError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| RbacError::KdlParse(e.to_string()))?;

    let mut manifest = ParsedManifest::default();

    for node in doc.nodes() {
        match node.name().value() {
            "role" => {
                let name = required_name(node, "role \"editor\" namespace=\"team-a\"")?;
                let namespace = string_prop(node, "namespace").ok_or_else(|| {
                    RbacError::InvalidPolicy(format!(
                        "role `{name}` requires a namespace property"
                    ))
                })?;
                let rules = rule_children(node, &name)?;
                manifest
                    .roles
                    .push(RoleObject::new(RoleIdentity::role(namespace, name), rules));
            }
            "cluster-role" => {
                let name = required_name(node, "cluster-role \"viewer\"")?;
                let rules = rule_children(node, &name)?;
                manifest
                    .roles
                    .push(RoleObject::new(RoleIdentity::cluster_role(name), rules));
            }
            "api-resources" => {
                let group_version = required_name(node, "api-resources \"apps/v1\"")?;
                for child in child_nodes(node) {
                    if child.name().value() != "resource" {
                        return Err(RbacError::InvalidPolicy(format!(
                            "unexpected child `{}` in api-resources `{group_version}` (expected `resource`)",
                            child.name().value()
                        )));
                    }
                    let resource = required_name(child, "resource \"deployments\"")?;
                    let mut verbs = Vec::new();
                    for grandchild in child_nodes(child) {
                        match grandchild.name().value() {
                            "verbs" => verbs = dash_list(grandchild),
                            other => {
                                return Err(RbacError::InvalidPolicy(format!(
                                    "unexpected child `{other}` in resource `{resource}` (expected `verbs`)"
                                )));
                            }
                        }
                    }
                    manifest.discovery.push(DiscoveredResource {
                        group_version: group_version.clone(),
                        resource,
                        verbs,
                    });
                }
            }
            "dynamic-role" => {
                let name = required_name(node, "dynamic-role \"dev\" namespace=\"team-a\"")?;
                let namespace = string_prop(node, "namespace").ok_or_else(|| {
                    RbacError::InvalidPolicy(format!(
                        "dynamic-role `{name}` requires a namespace property"
                    ))
                })?;
                let spec = parse_specification(node, &name)?;
                manifest.specs.push(DynamicRole {
                    name,
                    namespace: Some(namespace),
                    spec,
                });
            }
            "dynamic-cluster-role" => {
                let name = required_name(node, "dynamic-cluster-role \"ops\"")?;
                let spec = parse_specification(node, &name)?;
                manifest.specs.push(DynamicRole {
                    name,
                    namespace: None,
                    spec,
                });
            }
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(manifest)
}

fn parse_specification(node: &KdlNode, name: &str) -> Result<RoleSpecification, RbacError> {
    let mut spec = RoleSpecification::default();

    for child in child_nodes(node) {
        match child.name().value() {
            "inherit" => {
                for entry in child_nodes(child).iter().filter(|n| n.name().value() == "-") {
                    spec.inherit.push(parse_inherit_entry(entry, name)?);
                }
            }
            "allow" => spec.allow = Some(rule_children(child, name)?),
            "deny" => spec.deny = Some(rule_children(child, name)?),
            other => {
                return Err(RbacError::InvalidPolicy(format!(
                    "unexpected child `{other}` in `{name}` (expected `inherit`, `allow` or `deny`)"
                )));
            }
        }
    }

    Ok(spec)
}

fn parse_inherit_entry(node: &KdlNode, owner: &str) -> Result<InheritedRoleRef, RbacError> {
    let name = first_string_arg(node).ok_or_else(|| {
        RbacError::InvalidPolicy(format!(
            "inherit entry in `{owner}` requires a role name (e.g. - \"viewer\" kind=\"ClusterRole\")"
        ))
    })?;
    let kind = string_prop(node, "kind")
        .as_deref()
        .and_then(RoleKind::parse)
        .ok_or_else(|| {
            RbacError::InvalidPolicy(format!(
                "inherit entry `{name}` in `{owner}` needs kind=\"Role\" or kind=\"ClusterRole\""
            ))
        })?;
    Ok(InheritedRoleRef {
        name,
        kind,
        namespace: string_prop(node, "namespace"),
    })
}

/// Parse every `rule { … }` child of `node`.
fn rule_children(node: &KdlNode, owner: &str) -> Result<Vec<Rule>, RbacError> {
    let mut rules = Vec::new();
    for child in child_nodes(node) {
        if child.name().value() != "rule" {
            return Err(RbacError::InvalidPolicy(format!(
                "unexpected child `{}` in `{owner}` (expected `rule`)",
                child.name().value()
            )));
        }
        rules.push(parse_rule(child, owner)?);
    }
    Ok(rules)
}

fn parse_rule(node: &KdlNode, owner: &str) -> Result<Rule, RbacError> {
    let mut rule = Rule::default();
    for child in child_nodes(node) {
        match child.name().value() {
            "api-groups" => rule.api_groups = dash_list(child),
            "resources" => rule.resources = dash_list(child),
            "resource-names" => rule.resource_names = dash_list(child),
            "non-resource-urls" => rule.non_resource_urls = dash_list(child),
            "verbs" => rule.verbs = dash_list(child),
            other => {
                return Err(RbacError::InvalidPolicy(format!(
                    "unexpected child `{other}` in a rule of `{owner}`"
                )));
            }
        }
    }
    if rule.is_non_resource() && (!rule.api_groups.is_empty() || !rule.resources.is_empty()) {
        return Err(RbacError::InvalidPolicy(format!(
            "a rule of `{owner}` mixes non-resource-urls with api-groups/resources"
        )));
    }
    Ok(rule)
}

fn required_name(node: &KdlNode, example: &str) -> Result<String, RbacError> {
    first_string_arg(node).ok_or_else(|| {
        RbacError::InvalidPolicy(format!(
            "{} node requires a string argument (e.g. {example})",
            node.name().value()
        ))
    })
}

fn child_nodes(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|c| c.nodes()).unwrap_or(&[])
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn string_prop(node: &KdlNode, key: &str) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a string.
/// Example KDL:
/// ```kdl
/// verbs {
///     - "get"
///     - "list"
/// }
/// ```
fn dash_list(node: &KdlNode) -> Vec<String> {
    child_nodes(node)
        .iter()
        .filter(|n| n.name().value() == "-")
        .filter_map(first_string_arg)
        .collect()
}
