//! Rule registry - ordered index of all known rules

use crate::enablement;
use fleetguard_core::{Error, Feature, Profile, Result, Rule, RunConfiguration};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of all available hardening rules.
///
/// Registration order is execution and report order.
pub struct RuleRegistry {
    /// Rules in registration order
    rules: Vec<Arc<Rule>>,
    /// Position of each rule in `rules`, indexed by ID
    index: HashMap<String, usize>,
}

impl RuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a rule, rejecting malformed rules and duplicate IDs
    pub fn register(&mut self, rule: Rule) -> Result<Arc<Rule>> {
        rule.validate()?;

        if self.index.contains_key(rule.id()) {
            return Err(Error::DuplicateRule {
                rule_id: rule.id().to_string(),
            });
        }

        debug!("Registered rule: {} - {}", rule.id(), rule.description());

        let rule = Arc::new(rule);
        self.index.insert(rule.id().to_string(), self.rules.len());
        self.rules.push(Arc::clone(&rule));
        Ok(rule)
    }

    /// Get a rule by ID
    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.index.get(id).map(|&i| Arc::clone(&self.rules[i]))
    }

    /// Get a rule by ID, failing if it is not registered
    pub fn lookup(&self, id: &str) -> Result<Arc<Rule>> {
        self.get(id).ok_or_else(|| Error::RuleNotFound {
            rule_id: id.to_string(),
        })
    }

    /// All rule IDs in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.id())
    }

    /// All rules in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter()
    }

    /// Get number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules enabled under a run configuration, in registration order
    pub fn enabled(&self, config: &RunConfiguration) -> Vec<Arc<Rule>> {
        self.rules
            .iter()
            .filter(|r| enablement::enabled(r, config))
            .cloned()
            .collect()
    }

    /// Rules intrinsically applicable to a profile (ignoring features and audit mode)
    pub fn by_profile(&self, profile: Profile) -> Vec<Arc<Rule>> {
        self.rules
            .iter()
            .filter(|r| Profile::is_satisfied_by(r.minimum_profiles(), profile))
            .cloned()
            .collect()
    }

    /// Rules that would break a feature
    pub fn by_feature(&self, feature: Feature) -> Vec<Arc<Rule>> {
        self.rules
            .iter()
            .filter(|r| r.affected_features().contains(&feature))
            .cloned()
            .collect()
    }

    /// Filter rules by IDs, failing on the first unknown ID
    pub fn by_ids(&self, ids: &[String]) -> Result<Vec<Arc<Rule>>> {
        ids.iter().map(|id| self.lookup(id)).collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
