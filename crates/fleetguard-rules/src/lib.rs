//! FleetGuard Rules - Rule registry, enablement predicate and built-in catalog
//!
//! This crate provides:
//! - `RuleRegistry`: Ordered index of all known hardening rules
//! - `explain` / `enabled`: The profile, feature and audit gates that decide whether a rule runs
//! - `cis`: The built-in CIS Debian 13 rules

pub mod cis;
pub mod enablement;
pub mod registry;

pub use cis::builtin_registry;
pub use enablement::{enabled, explain, Enablement};
pub use registry::RuleRegistry;
