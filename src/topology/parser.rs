//! Topology Document Parser
//!
//! Turns the YAML cluster description into a [`NodeDatabase`] in two passes:
//! 1. **Collect**: every fully specified entry becomes a pending node keyed by
//!    its alias (or `host:port`).
//! 2. **Resolve**: every `ref` entry adds its section's role to the pending
//!    node it names. A slave reference may also move the node to its group.
//!
//! Validation of the finished topology (masters, slaves, replication masters)
//! belongs to [`NodeDatabase::new`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use super::types::{DEFAULT_GROUP_NAME, Node, NodeDatabase, Role};
use crate::error::{DispatchError, Result};

/// The four sections of the document. Each one is optional here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TopologyDocument {
    master: Vec<NodeEntry>,
    /// Deprecated.
    merger: Vec<NodeEntry>,
    backup: Vec<NodeEntry>,
    slave: Vec<NodeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeEntry {
    Reference {
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default)]
        group: Option<String>,
    },
    Full {
        host: String,
        port: u16,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        replicate: Option<String>,
        #[serde(default)]
        group: Option<String>,
    },
}

/// A node while references are still being resolved.
#[derive(Debug)]
struct PendingNode {
    host: String,
    port: u16,
    alias: Option<String>,
    replicate: Option<String>,
    roles: BTreeSet<Role>,
    group: String,
}

impl PendingNode {
    fn into_node(self) -> Node {
        let name = self
            .alias
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port));
        Node {
            host: self.host,
            port: self.port,
            name,
            roles: self.roles,
            replication_master: self.replicate,
            group: self.group,
        }
    }
}

#[derive(Debug)]
struct PendingRef {
    name: String,
    role: Role,
    group: String,
}

fn group_or_default(group: Option<String>) -> String {
    group
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string())
}

/// Builds a [`NodeDatabase`] from a topology document.
pub struct NodeDatabaseBuilder {
    document: TopologyDocument,
}

impl NodeDatabaseBuilder {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document =
            serde_yaml::from_str(yaml).map_err(|e| DispatchError::Config(e.to_string()))?;
        Ok(Self { document })
    }

    pub fn build(self) -> Result<NodeDatabase> {
        let document = self.document;

        let mut pending: Vec<PendingNode> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut by_address: HashMap<(String, u16), usize> = HashMap::new();
        let mut addresses: HashSet<String> = HashSet::new();
        let mut refs: Vec<PendingRef> = Vec::new();

        let sections = [
            (document.master, Role::Master),
            (document.merger, Role::Merger),
            (document.backup, Role::Backup),
            (document.slave, Role::Slave),
        ];

        for (entries, role) in sections {
            tracing::debug!("processing {} entries with role {}", entries.len(), role);

            for entry in entries {
                match entry {
                    NodeEntry::Reference { reference, group } => refs.push(PendingRef {
                        name: reference,
                        role,
                        group: group_or_default(group),
                    }),
                    NodeEntry::Full {
                        host,
                        port,
                        alias,
                        replicate,
                        group,
                    } => {
                        let alias = alias.filter(|a| !a.trim().is_empty());
                        let name = alias.clone().unwrap_or_else(|| format!("{}:{}", host, port));

                        if let Some(&idx) = by_address.get(&(host.clone(), port)) {
                            let existing = &mut pending[idx];
                            if alias.is_some() && alias != existing.alias {
                                return Err(DispatchError::Config(format!(
                                    "{}:{} is declared twice with different aliases",
                                    host, port
                                )));
                            }
                            existing.roles.insert(role);
                            continue;
                        }

                        if by_name.contains_key(&name) {
                            return Err(DispatchError::Config(format!(
                                "node name {} is used by more than one instance",
                                name
                            )));
                        }

                        let address = format!("{}:{}", host, port);
                        if by_name.contains_key(&address) {
                            return Err(DispatchError::Config(format!(
                                "{} is the alias of another instance",
                                address
                            )));
                        }
                        if addresses.contains(&name) {
                            return Err(DispatchError::Config(format!(
                                "alias {} is the address of another instance",
                                name
                            )));
                        }

                        let idx = pending.len();
                        pending.push(PendingNode {
                            host: host.clone(),
                            port,
                            alias,
                            replicate,
                            roles: BTreeSet::from([role]),
                            group: group_or_default(group),
                        });
                        by_name.insert(name, idx);
                        addresses.insert(address);
                        by_address.insert((host, port), idx);
                    }
                }
            }
        }

        for reference in refs {
            let Some(&idx) = by_name.get(&reference.name) else {
                return Err(DispatchError::Config(format!(
                    "cannot resolve reference name: {}",
                    reference.name
                )));
            };
            let node = &mut pending[idx];
            if reference.role == Role::Slave && node.group != reference.group {
                node.group = reference.group;
            }
            node.roles.insert(reference.role);
        }

        NodeDatabase::new(pending.into_iter().map(PendingNode::into_node).collect())
    }
}
