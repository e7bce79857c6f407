//! FleetGuard Engine - Runs hardening rules against a fleet
//!
//! This crate provides:
//! - `Orchestrator`: Dispatches enabled rules through an execution backend
//! - `ResultAggregate`: Per rule, per host outcomes of a run
//! - `ShellBackend`: Execution backend driving hosts with shell scripts over `sh` or `ssh`
//! - Text and JSON reports
//!
//! # Example
//!
//! ```no_run
//! use fleetguard_core::{HostSet, Profile, RunConfiguration};
//! use fleetguard_engine::{HostRouter, Orchestrator, ShellBackend, ShellOptions, SshTransport};
//!
//! let registry = fleetguard_rules::builtin_registry()?;
//! let backend = ShellBackend::new(
//!     Box::new(HostRouter::new(SshTransport::new("ssh"))),
//!     ShellOptions::default(),
//! )?;
//!
//! let config = RunConfiguration::new(Profile::ServerL1);
//! let aggregate = Orchestrator::new(&registry, &backend).run(&config, &HostSet::local())?;
//!
//! println!("{}", fleetguard_engine::report::render_text(&aggregate));
//! # Ok::<(), fleetguard_core::Error>(())
//! ```

pub mod aggregate;
pub mod backend;
pub mod orchestrator;
pub mod report;

pub use aggregate::{AggregateRecorder, ResultAggregate, RuleResult, RunSummary, SkippedRule};
pub use backend::{
    CommandOutput, HostRouter, LocalTransport, Script, ShellBackend, ShellOptions, SshTransport,
    Transport,
};
pub use orchestrator::{run, Orchestrator};
pub use report::{OutputFormat, RuleListing};
