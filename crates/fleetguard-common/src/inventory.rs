//! Inventory loading - YAML host groups into a `HostSet`
//!
//! ```yaml
//! web:
//!   data:
//!     ssh_user: admin
//!   hosts:
//!     - web-01:
//!         ssh_port: 2222
//!     - web-02:
//! ```

use fleetguard_core::{Error, Host, HostSet, Result, LOCAL_HOST};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

type Data = BTreeMap<String, Value>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupSpec {
    hosts: Vec<HostEntry>,
    #[serde(default)]
    data: Data,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostEntry {
    Name(String),
    WithData(BTreeMap<String, Option<Data>>),
}

/// Load an inventory argument: `@local`, or the path of a YAML inventory file
pub fn load_inventory(source: &str) -> Result<HostSet> {
    if source == LOCAL_HOST {
        debug!("Using local inventory");
        return Ok(HostSet::local());
    }
    load_inventory_file(source)
}

/// Load a YAML inventory file
pub fn load_inventory_file(path: impl AsRef<Path>) -> Result<HostSet> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::Inventory {
            path: path.display().to_string(),
            message: String::from("cannot find inventory"),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| Error::Inventory {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let hosts = parse_inventory(&content).map_err(|message| Error::Inventory {
        path: path.display().to_string(),
        message,
    })?;

    info!("Loaded {} hosts from {}", hosts.len(), path.display());
    Ok(hosts)
}

/// Parse inventory YAML.
///
/// Host data extends its group's data and wins on conflicts. A host listed
/// under several groups is merged; keys from earlier groups win.
pub fn parse_inventory(content: &str) -> std::result::Result<HostSet, String> {
    let groups: serde_yaml::Mapping = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    let mut hosts = HostSet::new();

    for (name, group) in groups {
        let group_name = name
            .as_str()
            .ok_or_else(|| format!("group name must be a string, got {:?}", name))?
            .to_string();
        let group: GroupSpec = serde_yaml::from_value(group)
            .map_err(|e| format!("group '{}': {}", group_name, e))?;

        for entry in group.hosts {
            for (host_name, host_data) in entry.into_hosts() {
                let mut host = Host::new(host_name).with_group(group_name.clone());
                host.data = host_data;
                for (key, value) in &group.data {
                    host.data.entry(key.clone()).or_insert_with(|| value.clone());
                }
                hosts.insert(host);
            }
        }
    }

    Ok(hosts)
}

impl HostEntry {
    fn into_hosts(self) -> Vec<(String, Data)> {
        match self {
            HostEntry::Name(name) => vec![(name, Data::new())],
            HostEntry::WithData(map) => map
                .into_iter()
                .map(|(name, data)| (name, data.unwrap_or_default()))
                .collect(),
        }
    }
}
