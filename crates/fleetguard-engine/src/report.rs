//! Report rendering for run results and rule listings

use crate::aggregate::ResultAggregate;
use fleetguard_core::{Error, Feature, HostResult, Outcome, Profile, Result, RunConfiguration};
use fleetguard_rules::{explain, Enablement, RuleRegistry};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Configuration(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Render a finished run
pub fn render(aggregate: &ResultAggregate, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(aggregate)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(aggregate)?),
    }
}

/// Human-readable run report
pub fn render_text(aggregate: &ResultAggregate) -> String {
    let mut out = String::new();
    let mode = if aggregate.is_dry_run() {
        "dry run"
    } else if aggregate.is_audit() {
        "audit"
    } else {
        "apply"
    };

    let _ = writeln!(
        out,
        "FleetGuard run {} (profile {}, {}, backend {})",
        aggregate.run_id(),
        aggregate.profile(),
        mode,
        aggregate.backend()
    );

    for rule in aggregate.rules() {
        let _ = writeln!(out, "\n[{}] {}", rule.rule_id, rule.description);
        if rule.hosts.is_empty() {
            let _ = writeln!(out, "  (no hosts)");
        }
        for (host, result) in &rule.hosts {
            write_host(&mut out, host, result, aggregate.is_dry_run());
        }
    }

    if !aggregate.skipped().is_empty() {
        let _ = writeln!(out, "\nSkipped:");
        for skipped in aggregate.skipped() {
            let _ = writeln!(out, "  {:<10} {}", skipped.rule_id, skipped.reason.reason());
        }
    }

    if let Some(error) = aggregate.commit_error() {
        let _ = writeln!(out, "\nCommit FAILED: {}", error);
    }

    let summary = aggregate.summary();
    let _ = writeln!(
        out,
        "\nSummary: {} rules run, {} skipped, {} hosts; {} changed, {} unchanged, {} failed",
        summary.rules_run,
        summary.rules_skipped,
        summary.hosts,
        summary.changed,
        summary.unchanged,
        summary.failed
    );
    out
}

fn write_host(out: &mut String, host: &str, result: &HostResult, dry_run: bool) {
    let status = match result.failure() {
        Some(failure) => format!("FAILED: {}", failure.message),
        None if result.changed() && dry_run => String::from("would change"),
        None if result.changed() => String::from("changed"),
        None => String::from("ok"),
    };
    let _ = writeln!(out, "  {:<20} {}", host, status);

    for step in &result.steps {
        match &step.outcome {
            Outcome::Applied(applied) if applied.changed => {
                for command in &applied.commands {
                    let _ = writeln!(out, "      $ {}", command);
                }
            }
            Outcome::Failed(failure) if !failure.stderr.trim().is_empty() => {
                let _ = writeln!(out, "      {}: {}", step.declaration, failure.stderr.trim());
            }
            _ => {}
        }
    }

    let stdout = result.stdout();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(out, "      | {}", line);
    }
}

/// One rule with its enablement decision under a run configuration
#[derive(Debug, Clone, Serialize)]
pub struct RuleListing {
    pub id: String,
    pub description: String,
    pub profiles: Vec<Profile>,
    pub affects: Vec<Feature>,
    pub audit_only: bool,
    pub enabled: bool,
    pub decision: Enablement,
}

/// Every registered rule, in registration order, with its decision
pub fn list_rules(registry: &RuleRegistry, config: &RunConfiguration) -> Vec<RuleListing> {
    registry
        .all()
        .map(|rule| {
            let decision = explain(rule, config);
            RuleListing {
                id: rule.id().to_string(),
                description: rule.description().to_string(),
                profiles: rule.minimum_profiles().iter().copied().collect(),
                affects: rule.affected_features().iter().copied().collect(),
                audit_only: rule.is_audit_only(),
                enabled: decision.is_enabled(),
                decision,
            }
        })
        .collect()
}

/// Render a rule listing
pub fn render_rules(listings: &[RuleListing], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(listings)?);
    }

    let mut out = String::new();
    for listing in listings {
        let mark = if listing.enabled { "+" } else { "-" };
        let _ = write!(out, "{} {:<10} {}", mark, listing.id, listing.description);
        if listing.audit_only {
            let _ = write!(out, " [audit]");
        }
        if !listing.enabled {
            let _ = write!(out, " ({})", listing.decision.reason());
        }
        out.push('\n');
    }
    let enabled = listings.iter().filter(|l| l.enabled).count();
    let _ = writeln!(out, "\n{} of {} rules enabled", enabled, listings.len());
    Ok(out)
}
