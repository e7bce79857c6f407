//! FleetGuard Core - Foundation types, traits, and error handling
//!
//! This crate provides the core abstractions used throughout FleetGuard:
//! - `Profile`: Hardening tiers (platform x level) and their inclusion chains
//! - `Feature`: Host capabilities an operator can ask to keep
//! - `Rule`: A hardening unit with applicability metadata and an action
//! - `ExecutionBackend`: The trait that applies desired-state declarations to hosts
//! - `HostSet`, `DesiredState`, `Outcome`: Data flowing between rules and backends

pub mod backend;
pub mod error;
pub mod feature;
pub mod host;
pub mod outcome;
pub mod profile;
pub mod rule;
pub mod run;
pub mod state;

// Re-export commonly used types at crate root
pub use backend::{DispatchMode, ExecutionBackend};
pub use error::{Error, ErrorKind, Result};
pub use feature::{Feature, Preset};
pub use host::{Host, HostSet, LOCAL_HOST};
pub use outcome::{Applied, Failure, HostOutcomes, HostResult, Outcome, Step};
pub use profile::{Level, Platform, Profile};
pub use rule::{Rule, RuleAction, RuleContext};
pub use run::RunConfiguration;
pub use state::DesiredState;
