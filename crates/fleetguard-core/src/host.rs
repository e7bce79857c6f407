//! Target hosts and host sets

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the pseudo-host that refers to the machine running FleetGuard
pub const LOCAL_HOST: &str = "@local";

/// A single target host with its merged inventory data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Host identifier (hostname, IP address, or `@local`)
    pub name: String,

    /// Groups the host was listed under
    #[serde(default)]
    pub groups: Vec<String>,

    /// Free-form key/value data (group data merged with host data)
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Host {
    /// Create a host with no data
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    /// The local machine
    pub fn local() -> Self {
        Self::new(LOCAL_HOST)
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Whether this host is the local machine
    pub fn is_local(&self) -> bool {
        self.name == LOCAL_HOST
    }

    /// Get a data value rendered as a string (numbers and booleans included)
    pub fn data_str(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Merge another entry for the same host; keys already present win
    pub fn merge(&mut self, other: Host) {
        for group in other.groups {
            if !self.groups.contains(&group) {
                self.groups.push(group);
            }
        }
        for (key, value) in other.data {
            self.data.entry(key).or_insert(value);
        }
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An ordered set of hosts with unique names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSet {
    hosts: Vec<Host>,
}

impl HostSet {
    /// Create an empty host set
    pub fn new() -> Self {
        Self::default()
    }

    /// A host set holding only the local machine
    pub fn local() -> Self {
        Self {
            hosts: vec![Host::local()],
        }
    }

    /// Add a host, merging with an existing entry of the same name.
    ///
    /// Returns `true` if the host was new.
    pub fn insert(&mut self, host: Host) -> bool {
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.name == host.name) {
            existing.merge(host);
            false
        } else {
            self.hosts.push(host);
            true
        }
    }

    pub fn get(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(|h| h.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Hosts of this set matching a predicate, in the same order
    pub fn filter(&self, keep: impl Fn(&Host) -> bool) -> HostSet {
        HostSet {
            hosts: self.hosts.iter().filter(|h| keep(h)).cloned().collect(),
        }
    }

    /// Hosts belonging to a group
    pub fn group(&self, group: &str) -> HostSet {
        self.filter(|h| h.groups.iter().any(|g| g == group))
    }
}

impl FromIterator<Host> for HostSet {
    fn from_iter<I: IntoIterator<Item = Host>>(iter: I) -> Self {
        let mut set = HostSet::new();
        for host in iter {
            set.insert(host);
        }
        set
    }
}

impl<'a> IntoIterator for &'a HostSet {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}
