//! Enablement predicate - decides whether a rule runs under a run configuration

use fleetguard_core::{Feature, Profile, Rule, RunConfiguration};
use serde::Serialize;

/// Why a rule is or is not enabled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Enablement {
    Enabled,
    /// The requested profile does not include the rule
    ProfileNotSatisfied,
    /// The rule would break features the operator asked to keep
    FeatureConflict { features: Vec<Feature> },
    /// The rule's audit flag does not match the run's audit mode
    AuditMismatch { audit_only: bool },
}

impl Enablement {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Enablement::Enabled)
    }

    /// Short reason for reports
    pub fn reason(&self) -> String {
        match self {
            Enablement::Enabled => String::from("enabled"),
            Enablement::ProfileNotSatisfied => String::from("not in profile"),
            Enablement::FeatureConflict { features } => {
                let names: Vec<&str> = features.iter().map(|f| f.as_str()).collect();
                format!("affects requested features: {}", names.join(", "))
            }
            Enablement::AuditMismatch { audit_only: true } => {
                String::from("audit-only rule in remediation run")
            }
            Enablement::AuditMismatch { audit_only: false } => {
                String::from("remediation rule in audit run")
            }
        }
    }
}

/// Evaluate the profile, feature and audit gates in order, stopping at the first failure
pub fn explain(rule: &Rule, config: &RunConfiguration) -> Enablement {
    if !Profile::is_satisfied_by(rule.minimum_profiles(), config.profile) {
        return Enablement::ProfileNotSatisfied;
    }

    let conflicts: Vec<Feature> = config
        .requested_features
        .intersection(rule.affected_features())
        .copied()
        .collect();
    if !conflicts.is_empty() {
        return Enablement::FeatureConflict {
            features: conflicts,
        };
    }

    if rule.is_audit_only() != config.audit {
        return Enablement::AuditMismatch {
            audit_only: rule.is_audit_only(),
        };
    }

    Enablement::Enabled
}

/// Whether a rule executes under a run configuration
pub fn enabled(rule: &Rule, config: &RunConfiguration) -> bool {
    explain(rule, config).is_enabled()
}
