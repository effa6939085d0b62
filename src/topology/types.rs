use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{DispatchError, Result};

/// Group every slave belongs to unless the topology names another one.
pub const DEFAULT_GROUP_NAME: &str = "DEFAULT";

/// Responsibilities a node can carry. A node may hold several.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Master,
    Slave,
    /// Obsolete query-merge role, still accepted in topology documents.
    Merger,
    Backup,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Master => "MASTER",
            Role::Slave => "SLAVE",
            Role::Merger => "MERGER",
            Role::Backup => "BACKUP",
        };
        f.write_str(label)
    }
}

/// One index-server instance of the cluster.
///
/// Immutable once the topology is built. Equality covers every field, so two
/// entries describing the same instance with the same roles compare equal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct Node {
    pub host: String,
    pub port: u16,
    /// Alias from the topology document, or `host:port` when none was given.
    pub name: String,
    pub roles: BTreeSet<Role>,
    /// Name of the node this one replicates its index from.
    pub replication_master: Option<String>,
    pub group: String,
}

impl Node {
    pub fn new(host: &str, port: u16, role: Role, replication_master: Option<&str>) -> Self {
        Self {
            host: host.to_string(),
            port,
            name: format!("{}:{}", host, port),
            roles: BTreeSet::from([role]),
            replication_master: replication_master.map(str::to_string),
            group: DEFAULT_GROUP_NAME.to_string(),
        }
    }

    /// `host:port`, always a valid lookup key in the [`NodeDatabase`].
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address in the form index servers expect in a `shards` parameter.
    pub fn shard_address(&self) -> String {
        format!("{}:{}/solr", self.host, self.port)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_master(&self) -> bool {
        self.has_role(Role::Master)
    }

    pub fn is_slave(&self) -> bool {
        self.has_role(Role::Slave)
    }

    pub fn is_backup(&self) -> bool {
        self.has_role(Role::Backup)
    }

    pub fn is_merger(&self) -> bool {
        self.has_role(Role::Merger)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address())
    }
}

/// Read-only snapshot of the whole cluster.
///
/// Holds every node in document order plus the lookup tables the dispatcher
/// needs. Construction validates the topology; there is no way to mutate it
/// afterwards.
#[derive(Debug)]
pub struct NodeDatabase {
    nodes: Vec<Arc<Node>>,
    by_name: HashMap<String, Arc<Node>>,
    by_host: HashMap<String, Vec<Arc<Node>>>,
    masters: Vec<Arc<Node>>,
    slaves: Vec<Arc<Node>>,
    backups: Vec<Arc<Node>>,
    slave_groups: BTreeMap<String, Vec<Arc<Node>>>,
}

impl NodeDatabase {
    /// Indexes and validates `nodes`.
    ///
    /// Fails with [`DispatchError::Config`] when there is no master or no
    /// slave, when a node is incomplete, when a name or address points at two
    /// nodes, or when a replication master names no known node.
    pub fn new(nodes: Vec<Node>) -> Result<Self> {
        let nodes: Vec<Arc<Node>> = nodes.into_iter().map(Arc::new).collect();

        let mut by_name = HashMap::new();
        let mut by_host: HashMap<String, Vec<Arc<Node>>> = HashMap::new();
        let mut masters = Vec::new();
        let mut slaves = Vec::new();
        let mut backups = Vec::new();
        let mut slave_groups: BTreeMap<String, Vec<Arc<Node>>> = BTreeMap::new();

        for node in &nodes {
            if node.host.is_empty() || node.port == 0 {
                return Err(DispatchError::Config(format!(
                    "invalid node with name: {}",
                    node.name
                )));
            }

            bind_name(&mut by_name, node.name.clone(), node)?;
            bind_name(&mut by_name, node.address(), node)?;
            by_host
                .entry(node.host.clone())
                .or_default()
                .push(node.clone());

            if node.is_master() {
                masters.push(node.clone());
            }
            if node.is_merger() {
                tracing::info!("Role merger is obsolete: {}", node.name);
            }
            if node.is_slave() {
                slaves.push(node.clone());
                slave_groups
                    .entry(node.group.clone())
                    .or_default()
                    .push(node.clone());
            }
            if node.is_backup() {
                backups.push(node.clone());
            }
        }

        let database = Self {
            nodes,
            by_name,
            by_host,
            masters,
            slaves,
            backups,
            slave_groups,
        };
        database.validate()?;
        Ok(database)
    }

    fn validate(&self) -> Result<()> {
        if self.masters.is_empty() {
            return Err(DispatchError::Config("no master node".to_string()));
        }
        if self.slaves.is_empty() {
            return Err(DispatchError::Config("no slave node".to_string()));
        }

        for node in &self.nodes {
            match &node.replication_master {
                Some(master) if !self.by_name.contains_key(master) => {
                    return Err(DispatchError::Config(format!(
                        "no node named {} (replication master of {})",
                        master, node.name
                    )));
                }
                None if node.is_slave() || node.is_backup() => {
                    tracing::info!(
                        "node (slave or backup) {} does not have a replication master",
                        node.address()
                    );
                }
                _ => {}
            }
        }

        for (host, instances) in &self.by_host {
            if instances.len() > 1 {
                tracing::info!("host {} runs {} index instances", host, instances.len());
            }
        }

        Ok(())
    }

    /// Every node exactly once, in document order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn masters(&self) -> &[Arc<Node>] {
        &self.masters
    }

    pub fn slaves(&self) -> &[Arc<Node>] {
        &self.slaves
    }

    pub fn backups(&self) -> &[Arc<Node>] {
        &self.backups
    }

    pub fn slave_group_names(&self) -> impl Iterator<Item = &str> {
        self.slave_groups.keys().map(String::as_str)
    }

    pub fn slaves_in_group(&self, group: &str) -> Option<&[Arc<Node>]> {
        self.slave_groups.get(group).map(Vec::as_slice)
    }

    pub fn nodes_by_host(&self, host: &str) -> Option<&[Arc<Node>]> {
        self.by_host.get(host).map(Vec::as_slice)
    }

    /// Looks a node up by alias or by `host:port`.
    pub fn node_by_name(&self, name: &str) -> Option<&Arc<Node>> {
        self.by_name.get(name)
    }

    pub fn node_by_host_and_port(&self, host: &str, port: u16) -> Option<&Arc<Node>> {
        self.node_by_name(&format!("{}:{}", host, port))
    }
}

/// Binds `key` to `node` unless it already belongs to another node.
fn bind_name(
    by_name: &mut HashMap<String, Arc<Node>>,
    key: String,
    node: &Arc<Node>,
) -> Result<()> {
    match by_name.get(&key) {
        Some(existing) if !Arc::ptr_eq(existing, node) => Err(DispatchError::Config(format!(
            "{} names both {} and {}",
            key,
            existing.address(),
            node.address()
        ))),
        _ => {
            by_name.insert(key, node.clone());
            Ok(())
        }
    }
}
