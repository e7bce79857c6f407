//! Execution backend interface - connects to hosts and applies declarations

use crate::error::Result;
use crate::host::HostSet;
use crate::outcome::HostOutcomes;
use crate::state::DesiredState;

/// Whether declarations are applied or only planned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Make changes on the hosts
    #[default]
    Apply,
    /// Determine what would change without touching the hosts
    Plan,
}

/// A service that brings hosts into a desired state.
///
/// Implementations own idempotence: applying a declaration that already
/// holds must report `changed = false` and must not re-run the change.
/// Per-host problems are reported as `Outcome::Failed` entries; an `Err`
/// means the call as a whole failed and applies to every host passed in.
pub trait ExecutionBackend: Send + Sync {
    /// Backend name for logs and reports
    fn name(&self) -> &str;

    /// Apply a declaration to every host in the set
    fn apply(&self, hosts: &HostSet, declaration: &DesiredState) -> Result<HostOutcomes>;

    /// Report what applying the declaration would do, without changing anything
    fn plan(&self, hosts: &HostSet, declaration: &DesiredState) -> Result<HostOutcomes>;

    /// Flush batched declarations. Immediate-dispatch backends do nothing here.
    fn commit(&self) -> Result<()> {
        Ok(())
    }

    /// Dispatch according to `mode`
    fn dispatch(
        &self,
        mode: DispatchMode,
        hosts: &HostSet,
        declaration: &DesiredState,
    ) -> Result<HostOutcomes> {
        match mode {
            DispatchMode::Apply => self.apply(hosts, declaration),
            DispatchMode::Plan => self.plan(hosts, declaration),
        }
    }
}
