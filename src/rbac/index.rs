use std::collections::{BTreeMap, BTreeSet};

use crate::rbac::types::{PolicyKey, Rule};

/// Deduplicated rule set: one verb set per permission dimension.
///
/// No two entries share a key and no entry has an empty verb set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyIndex {
    entries: BTreeMap<PolicyKey, BTreeSet<String>>,
}

impl PolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> Self {
        let mut index = Self::new();
        for rule in rules {
            index.insert(rule);
        }
        index
    }

    /// Add a rule, unioning verbs into any existing entry. Multi-valued rules
    /// are inserted once per dimension they cover.
    pub fn insert(&mut self, rule: &Rule) {
        if rule.verbs.is_empty() {
            return;
        }
        for key in PolicyKey::all_of(rule) {
            self.insert_verbs(key, rule.verbs.iter().cloned());
        }
    }

    fn insert_verbs(&mut self, key: PolicyKey, verbs: impl IntoIterator<Item = String>) {
        let verbs: BTreeSet<String> = verbs.into_iter().collect();
        if verbs.is_empty() {
            return;
        }
        self.entries.entry(key).or_default().extend(verbs);
    }

    /// Flatten to canonical rules. Callers must not rely on the order.
    pub fn to_rules(&self) -> Vec<Rule> {
        self.entries
            .iter()
            .map(|(key, verbs)| key.to_rule(verbs.iter().cloned()))
            .collect()
    }

    /// Union of two indexes; neither input is modified.
    pub fn union(&self, other: &PolicyIndex) -> PolicyIndex {
        let mut out = other.clone();
        out.merge(self.clone());
        out
    }

    /// In-place union.
    pub fn merge(&mut self, other: PolicyIndex) {
        for (key, verbs) in other.entries {
            if verbs.is_empty() {
                continue;
            }
            self.entries.entry(key).or_default().extend(verbs);
        }
    }

    /// Remove `verbs` from the entry at `key`, dropping the entry once empty.
    pub fn subtract_verbs<'a>(&mut self, key: &PolicyKey, verbs: impl IntoIterator<Item = &'a String>) {
        let Some(set) = self.entries.get_mut(key) else {
            return;
        };
        for verb in verbs {
            set.remove(verb);
        }
        if set.is_empty() {
            self.entries.remove(key);
        }
    }

    pub fn remove(&mut self, key: &PolicyKey) -> Option<BTreeSet<String>> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &PolicyKey) -> Option<&BTreeSet<String>> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PolicyKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<&'a Rule> for PolicyIndex {
    fn from_iter<T: IntoIterator<Item = &'a Rule>>(iter: T) -> Self {
        Self::from_rules(iter)
    }
}
