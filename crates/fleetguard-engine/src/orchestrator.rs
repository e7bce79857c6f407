//! Execution orchestrator - runs enabled rules against a host set

use crate::aggregate::{AggregateRecorder, ResultAggregate};
use fleetguard_core::{
    DispatchMode, ExecutionBackend, HostSet, Result, RuleContext, RunConfiguration,
};
use fleetguard_rules::{explain, RuleRegistry};
use tracing::{debug, info, warn};

/// Dispatches every enabled rule of a registry through an execution backend
pub struct Orchestrator<'a> {
    registry: &'a RuleRegistry,
    backend: &'a dyn ExecutionBackend,
    dry_run: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a RuleRegistry, backend: &'a dyn ExecutionBackend) -> Self {
        Self {
            registry,
            backend,
            dry_run: false,
        }
    }

    /// Plan instead of apply, and never commit
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run all enabled rules, in registration order, against `hosts`.
    ///
    /// Per-host backend failures and a failed commit are recorded and the run
    /// still returns its results. An error returned by a rule action aborts
    /// the run.
    pub fn run(&self, config: &RunConfiguration, hosts: &HostSet) -> Result<ResultAggregate> {
        let mode = if self.dry_run {
            DispatchMode::Plan
        } else {
            DispatchMode::Apply
        };

        info!(
            profile = %config.profile,
            audit = config.audit,
            dry_run = self.dry_run,
            backend = self.backend.name(),
            "Starting hardening run on {} hosts",
            hosts.len()
        );

        let mut recorder = AggregateRecorder::new(config, self.backend.name(), self.dry_run);

        for rule in self.registry.all() {
            let decision = explain(rule, config);
            if !decision.is_enabled() {
                debug!("Skipping rule {} ({})", rule.id(), decision.reason());
                recorder.skip(rule.id(), decision);
                continue;
            }

            info!("Running rule {} - {}", rule.id(), rule.description());

            let mut ctx = RuleContext::new(rule.id(), hosts, self.backend, mode);
            rule.execute(&mut ctx)?;
            debug!(
                "Rule {} issued {} declarations",
                rule.id(),
                ctx.declared()
            );

            recorder.record(rule.id(), rule.description(), ctx.into_results());
        }

        if !self.dry_run {
            if let Err(e) = self.backend.commit() {
                warn!(code = e.code(), "Backend commit failed: {}", e);
                recorder.commit_failed(e.to_string());
            }
        }

        let aggregate = recorder.finish();
        let summary = aggregate.summary();
        info!(
            "Run complete: {} rules run, {} skipped, {} changed, {} unchanged, {} failed",
            summary.rules_run,
            summary.rules_skipped,
            summary.changed,
            summary.unchanged,
            summary.failed
        );

        Ok(aggregate)
    }
}

/// Run `registry` against `hosts` through `backend`, applying changes
pub fn run(
    registry: &RuleRegistry,
    config: &RunConfiguration,
    hosts: &HostSet,
    backend: &dyn ExecutionBackend,
) -> Result<ResultAggregate> {
    Orchestrator::new(registry, backend).run(config, hosts)
}
