use crate::rbac::catalog::{CatalogEntry, ResourceCatalog};
use crate::rbac::types::Rule;

/// Whether URL rules survive expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonResourceUrls {
    Keep,
    /// Rules are moving from a cluster scope into a namespace, where
    /// non-resource URLs mean nothing.
    Drop,
}

/// Resolve group/resource wildcards against the catalog.
///
/// Resource rules are matched against catalog entries; each match yields a
/// rule for exactly one (group, resource). Explicit verbs replace the
/// catalog's verbs; a `*` verb keeps the catalog's. URL rules pass through
/// untouched unless `urls` is [`NonResourceUrls::Drop`].
pub fn enumerate(rules: &[Rule], catalog: &ResourceCatalog, urls: NonResourceUrls) -> Vec<Rule> {
    let mut out = Vec::new();

    for rule in rules {
        if rule.is_non_resource() {
            if urls == NonResourceUrls::Keep {
                out.push(rule.clone());
            }
            continue;
        }

        match (rule.has_group_wildcard(), rule.has_resource_wildcard()) {
            (true, true) => {
                out.extend(catalog.entries().iter().map(|e| emit(rule, e)));
            }
            (true, false) => {
                for resource in &rule.resources {
                    out.extend(catalog.with_resource(resource).map(|e| emit(rule, e)));
                }
            }
            (false, true) => {
                for group in &rule.api_groups {
                    out.extend(catalog.in_group(group).map(|e| emit(rule, e)));
                }
            }
            (false, false) => {
                for group in &rule.api_groups {
                    for resource in &rule.resources {
                        match catalog.get(group, resource) {
                            Some(entry) => out.push(emit(rule, entry)),
                            None => tracing::debug!(
                                group = %group,
                                resource = %resource,
                                "dropping rule for resource unknown to the catalog"
                            ),
                        }
                    }
                }
            }
        }
    }

    out
}

fn emit(rule: &Rule, entry: &CatalogEntry) -> Rule {
    let verbs = if rule.has_verb_wildcard() {
        entry.verbs.iter().cloned().collect()
    } else {
        rule.verbs.clone()
    };
    Rule {
        api_groups: vec![entry.api_group.clone()],
        resources: vec![entry.resource.clone()],
        resource_names: rule.resource_names.clone(),
        non_resource_urls: Vec::new(),
        verbs,
    }
}

/// Split rules so every dimension holds a single value. Each emitted rule
/// owns its own copies of the group and verb lists.
pub fn canonicalize(rules: &[Rule]) -> Vec<Rule> {
    let mut out = Vec::with_capacity(rules.len());

    for rule in rules {
        if rule.is_canonical() {
            out.push(rule.clone());
            continue;
        }

        if rule.is_non_resource() {
            for url in &rule.non_resource_urls {
                out.push(Rule::non_resource([url.clone()], rule.verbs.clone()));
            }
            continue;
        }

        let names: Vec<Vec<String>> = if rule.resource_names.is_empty() {
            vec![Vec::new()]
        } else {
            rule.resource_names.iter().map(|n| vec![n.clone()]).collect()
        };

        for group in &rule.api_groups {
            for resource in &rule.resources {
                for name in &names {
                    out.push(
                        Rule::resource([group.clone()], [resource.clone()], rule.verbs.clone())
                            .with_resource_names(name.clone()),
                    );
                }
            }
        }
    }

    out
}

/// `enumerate` followed by `canonicalize`.
pub fn expand(rules: &[Rule], catalog: &ResourceCatalog, urls: NonResourceUrls) -> Vec<Rule> {
    canonicalize(&enumerate(rules, catalog, urls))
}
