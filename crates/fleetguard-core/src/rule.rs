//! Hardening rules - applicability metadata plus a remediation action

use crate::backend::{DispatchMode, ExecutionBackend};
use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::host::HostSet;
use crate::outcome::{HostResult, Outcome};
use crate::profile::Profile;
use crate::state::DesiredState;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// The remediation (or audit) work a rule performs against a host set
pub type RuleAction = Arc<dyn Fn(&mut RuleContext<'_>) -> Result<()> + Send + Sync>;

/// One hardening check/remediation unit
#[derive(Clone)]
pub struct Rule {
    id: String,
    description: String,
    minimum_profiles: BTreeSet<Profile>,
    affected_features: BTreeSet<Feature>,
    audit_only: bool,
    action: RuleAction,
}

impl Rule {
    /// Create a rule with no profiles, no affected features, in remediation mode
    pub fn new<F>(id: impl Into<String>, description: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut RuleContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            description: description.into(),
            minimum_profiles: BTreeSet::new(),
            affected_features: BTreeSet::new(),
            audit_only: false,
            action: Arc::new(action),
        }
    }

    /// Add profiles under which the rule is intrinsically applicable
    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = Profile>) -> Self {
        self.minimum_profiles.extend(profiles);
        self
    }

    /// Declare a feature the rule would break if applied
    pub fn affects(mut self, feature: Feature) -> Self {
        self.affected_features.insert(feature);
        self
    }

    /// Mark the rule as report-only
    pub fn audit_only(mut self) -> Self {
        self.audit_only = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn minimum_profiles(&self) -> &BTreeSet<Profile> {
        &self.minimum_profiles
    }

    pub fn affected_features(&self) -> &BTreeSet<Feature> {
        &self.affected_features
    }

    pub fn is_audit_only(&self) -> bool {
        self.audit_only
    }

    /// Make sure the rule is well-formed
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidRule {
                rule_id: String::from("<unnamed>"),
                message: String::from("rule id must not be empty"),
            });
        }
        if self.description.trim().is_empty() {
            return Err(Error::InvalidRule {
                rule_id: self.id.clone(),
                message: String::from("rule description must not be empty"),
            });
        }
        if self.minimum_profiles.is_empty() {
            return Err(Error::InvalidRule {
                rule_id: self.id.clone(),
                message: String::from("rule must apply to at least one profile"),
            });
        }
        Ok(())
    }

    /// Run the rule's action, issuing its declarations through `ctx`
    pub fn execute(&self, ctx: &mut RuleContext<'_>) -> Result<()> {
        (self.action)(ctx).map_err(|e| match e {
            Error::ActionFailed { .. } => e,
            other => Error::ActionFailed {
                rule_id: self.id.clone(),
                message: other.to_string(),
            },
        })
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("minimum_profiles", &self.minimum_profiles)
            .field("affected_features", &self.affected_features)
            .field("audit_only", &self.audit_only)
            .field("action", &"...")
            .finish()
    }
}

/// Context handed to a rule's action while it runs.
///
/// Collects the per-host results of every declaration the action issues.
/// Once a host fails a declaration, the rule's remaining declarations skip it.
pub struct RuleContext<'a> {
    rule_id: &'a str,
    hosts: &'a HostSet,
    backend: &'a dyn ExecutionBackend,
    mode: DispatchMode,
    results: BTreeMap<String, HostResult>,
    failed: BTreeSet<String>,
    declared: usize,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        rule_id: &'a str,
        hosts: &'a HostSet,
        backend: &'a dyn ExecutionBackend,
        mode: DispatchMode,
    ) -> Self {
        Self {
            rule_id,
            hosts,
            backend,
            mode,
            results: BTreeMap::new(),
            failed: BTreeSet::new(),
            declared: 0,
        }
    }

    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    /// Hosts the rule runs against
    pub fn hosts(&self) -> &HostSet {
        self.hosts
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Number of declarations issued so far
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Issue a declaration to every host that has not failed yet in this rule
    pub fn declare(&mut self, declaration: DesiredState) {
        self.declared += 1;
        let label = declaration.describe();
        let targets = self.hosts.filter(|h| !self.failed.contains(&h.name));

        if targets.is_empty() {
            debug!(rule = self.rule_id, "No hosts left for: {}", label);
            return;
        }

        debug!(
            rule = self.rule_id,
            hosts = targets.len(),
            "Declaring: {}",
            label
        );

        let mut outcomes = match self.backend.dispatch(self.mode, &targets, &declaration) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(
                    rule = self.rule_id,
                    backend = self.backend.name(),
                    "Backend call failed for '{}': {}",
                    label,
                    e
                );
                targets
                    .names()
                    .map(|name| (name.to_string(), Outcome::failed(e.to_string())))
                    .collect()
            }
        };

        for host in &targets {
            let outcome = outcomes
                .remove(&host.name)
                .unwrap_or_else(|| Outcome::failed("backend returned no result for host"));

            if let Some(failure) = outcome.failure() {
                warn!(
                    rule = self.rule_id,
                    host = %host.name,
                    "Failed '{}': {}",
                    label,
                    failure.message
                );
                self.failed.insert(host.name.clone());
            }

            self.results
                .entry(host.name.clone())
                .or_default()
                .push(label.clone(), outcome);
        }
    }

    /// Per-host results collected so far
    pub fn into_results(self) -> BTreeMap<String, HostResult> {
        self.results
    }
}
