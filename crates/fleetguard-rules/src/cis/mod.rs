//! Built-in CIS benchmark rules

pub mod debian_13;

use crate::RuleRegistry;
use fleetguard_core::Result;
use tracing::info;

/// Register every built-in rule, in benchmark order
pub fn register_builtin(registry: &mut RuleRegistry) -> Result<()> {
    debian_13::register(registry)?;
    Ok(())
}

/// A registry holding only the built-in rules
pub fn builtin_registry() -> Result<RuleRegistry> {
    let mut registry = RuleRegistry::new();
    register_builtin(&mut registry)?;
    info!("Loaded {} built-in rules", registry.len());
    Ok(registry)
}
