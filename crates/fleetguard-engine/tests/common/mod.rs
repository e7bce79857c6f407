//! Shared fixtures for engine integration tests

use fleetguard_core::{
    DesiredState, Error, ExecutionBackend, Host, HostOutcomes, HostSet, Outcome, Result,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory idempotent backend.
///
/// Tracks which declarations hold on each host. Hosts listed in `failing`
/// report a failure for every declaration.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<BTreeMap<String, BTreeSet<String>>>,
    failing: BTreeSet<String>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    commits: AtomicUsize,
    commit_error: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(hosts: &[&str]) -> Self {
        Self {
            failing: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Backend whose commit fails with `message`
    pub fn failing_commit(message: &str) -> Self {
        Self {
            commit_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// `(declaration, hosts)` for every backend call, in order
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Declarations that currently hold on a host
    pub fn state_of(&self, host: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .unwrap_or_default()
    }

    fn dispatch_all(&self, hosts: &HostSet, declaration: &DesiredState, write: bool) -> HostOutcomes {
        let label = declaration.describe();
        self.calls
            .lock()
            .unwrap()
            .push((label.clone(), hosts.names().map(String::from).collect()));

        let mut state = self.state.lock().unwrap();
        hosts
            .names()
            .map(|name| {
                let outcome = if self.failing.contains(name) {
                    Outcome::failed("connection refused")
                } else if !declaration.is_mutating() {
                    Outcome::unchanged().with_output(format!("{} ok", label), "")
                } else {
                    let held = state.entry(name.to_string()).or_default();
                    if held.contains(&label) {
                        Outcome::unchanged()
                    } else {
                        if write {
                            held.insert(label.clone());
                        }
                        Outcome::changed(vec![label.clone()])
                    }
                };
                (name.to_string(), outcome)
            })
            .collect()
    }
}

impl ExecutionBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn apply(&self, hosts: &HostSet, declaration: &DesiredState) -> Result<HostOutcomes> {
        Ok(self.dispatch_all(hosts, declaration, true))
    }

    fn plan(&self, hosts: &HostSet, declaration: &DesiredState) -> Result<HostOutcomes> {
        Ok(self.dispatch_all(hosts, declaration, false))
    }

    fn commit(&self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        match &self.commit_error {
            Some(message) => Err(Error::Backend {
                host: "h2".to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

pub fn hosts(names: &[&str]) -> HostSet {
    names.iter().map(|n| Host::new(*n)).collect()
}
