//! Result aggregate - per rule, per host outcomes of a run

use chrono::{DateTime, Utc};
use fleetguard_core::{HostResult, Profile, RunConfiguration};
use fleetguard_rules::Enablement;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Outcomes of one executed rule, keyed by host name
#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub description: String,
    pub hosts: BTreeMap<String, HostResult>,
}

/// A rule the enablement gates rejected
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    pub rule_id: String,
    pub reason: Enablement,
}

/// Totals over a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Rules whose action was invoked
    pub rules_run: usize,
    /// Rules rejected by the enablement gates
    pub rules_skipped: usize,
    /// Distinct hosts that appear in any rule result
    pub hosts: usize,
    /// Rule/host pairs where at least one step changed the host
    pub changed: usize,
    /// Rule/host pairs where every step was already satisfied
    pub unchanged: usize,
    /// Rule/host pairs with a recorded failure
    pub failed: usize,
}

/// Builds a [`ResultAggregate`] while the orchestrator runs
pub struct AggregateRecorder {
    run_id: Uuid,
    profile: Profile,
    audit: bool,
    dry_run: bool,
    backend: String,
    started_at: DateTime<Utc>,
    rules: Vec<RuleResult>,
    skipped: Vec<SkippedRule>,
    commit_error: Option<String>,
}

impl AggregateRecorder {
    /// Start recording a run
    pub fn new(config: &RunConfiguration, backend: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            profile: config.profile,
            audit: config.audit,
            dry_run,
            backend: backend.into(),
            started_at: Utc::now(),
            rules: Vec::new(),
            skipped: Vec::new(),
            commit_error: None,
        }
    }

    /// Record the per-host results of an executed rule
    pub fn record(
        &mut self,
        rule_id: impl Into<String>,
        description: impl Into<String>,
        hosts: BTreeMap<String, HostResult>,
    ) {
        self.rules.push(RuleResult {
            rule_id: rule_id.into(),
            description: description.into(),
            hosts,
        });
    }

    /// Record a rule that did not run
    pub fn skip(&mut self, rule_id: impl Into<String>, reason: Enablement) {
        self.skipped.push(SkippedRule {
            rule_id: rule_id.into(),
            reason,
        });
    }

    /// Record that the backend failed to commit the run's changes
    pub fn commit_failed(&mut self, message: impl Into<String>) {
        self.commit_error = Some(message.into());
    }

    /// Freeze the recorded results
    pub fn finish(self) -> ResultAggregate {
        ResultAggregate {
            run_id: self.run_id,
            profile: self.profile,
            audit: self.audit,
            dry_run: self.dry_run,
            backend: self.backend,
            started_at: self.started_at,
            finished_at: Utc::now(),
            rules: self.rules,
            skipped: self.skipped,
            commit_error: self.commit_error,
        }
    }
}

/// Frozen outcome of a run.
///
/// Rules appear in registration order. There is no mutation API; build one
/// through [`AggregateRecorder`].
#[derive(Debug, Clone, Serialize)]
pub struct ResultAggregate {
    run_id: Uuid,
    profile: Profile,
    audit: bool,
    dry_run: bool,
    backend: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    rules: Vec<RuleResult>,
    skipped: Vec<SkippedRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_error: Option<String>,
}

impl ResultAggregate {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn is_audit(&self) -> bool {
        self.audit
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// `(rule id, host results)` in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, HostResult>)> {
        self.rules.iter().map(|r| (r.rule_id.as_str(), &r.hosts))
    }

    /// Executed rules with their descriptions
    pub fn rules(&self) -> &[RuleResult] {
        &self.rules
    }

    pub fn skipped(&self) -> &[SkippedRule] {
        &self.skipped
    }

    /// Why the backend could not commit, when it could not
    pub fn commit_error(&self) -> Option<&str> {
        self.commit_error.as_deref()
    }

    /// Host results of an executed rule
    pub fn rule(&self, rule_id: &str) -> Option<&BTreeMap<String, HostResult>> {
        self.rules
            .iter()
            .find(|r| r.rule_id == rule_id)
            .map(|r| &r.hosts)
    }

    /// Result of one rule on one host
    pub fn host(&self, rule_id: &str, host: &str) -> Option<&HostResult> {
        self.rule(rule_id)?.get(host)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            rules_run: self.rules.len(),
            rules_skipped: self.skipped.len(),
            ..RunSummary::default()
        };
        let mut hosts = BTreeSet::new();

        for rule in &self.rules {
            for (host, result) in &rule.hosts {
                hosts.insert(host.as_str());
                if result.is_failure() {
                    summary.failed += 1;
                } else if result.changed() {
                    summary.changed += 1;
                } else {
                    summary.unchanged += 1;
                }
            }
        }

        summary.hosts = hosts.len();
        summary
    }

    /// Whether any rule failed on any host, or the commit failed
    pub fn has_failures(&self) -> bool {
        self.commit_error.is_some()
            || self
                .rules
                .iter()
                .any(|r| r.hosts.values().any(HostResult::is_failure))
    }
}
