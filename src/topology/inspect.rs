//! Instance inspection helpers used by the `properties` and `nodes` commands.

use std::fmt;
use std::sync::Arc;

use super::types::{Node, NodeDatabase};
use crate::error::{DispatchError, Result};

/// How an instance should be started, derived from its roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    /// Accepts writes and does not replicate.
    Index,
    /// Pulls its index from a replication master.
    Replicate,
    /// Both or neither.
    Standalone,
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstanceRole::Index => "INDEX",
            InstanceRole::Replicate => "REPLICATE",
            InstanceRole::Standalone => "STANDALONE",
        };
        f.write_str(label)
    }
}

pub fn detect_role(node: &Node) -> InstanceRole {
    let indexes = node.is_master();
    let replicates = node.is_slave() || node.is_backup();
    match (indexes, replicates) {
        (true, false) => InstanceRole::Index,
        (false, true) => InstanceRole::Replicate,
        _ => InstanceRole::Standalone,
    }
}

/// `KEY=value` lines describing how `node` runs.
pub fn instance_properties(node: &Node, database: &NodeDatabase) -> Vec<String> {
    let mut lines = vec![format!("INSTANCE_TYPE={}", detect_role(node))];
    if let Some(master) = node
        .replication_master
        .as_deref()
        .and_then(|name| database.node_by_name(name))
    {
        lines.push(format!("REPLICATION_MASTER_NODE={}", master.host));
        lines.push(format!("REPLICATION_MASTER_PORT={}", master.port));
    }
    lines
}

/// One `host_port_ROLE` line per node, in topology order.
pub fn cluster_listing(database: &NodeDatabase) -> Vec<String> {
    database
        .nodes()
        .iter()
        .map(|node| format!("{}_{}_{}", node.host, node.port, detect_role(node)))
        .collect()
}

pub fn resolve_by_name(database: &NodeDatabase, name: &str) -> Result<Arc<Node>> {
    database
        .node_by_name(name)
        .cloned()
        .ok_or_else(|| DispatchError::TargetNotFound(format!("no instance named {}", name)))
}

/// Finds the instance on `host`. The port may be omitted when the host runs
/// exactly one instance.
pub fn resolve_by_host(
    database: &NodeDatabase,
    host: &str,
    port: Option<u16>,
) -> Result<Arc<Node>> {
    let instances = database.nodes_by_host(host).ok_or_else(|| {
        DispatchError::TargetNotFound(format!("no index instance on host {}", host))
    })?;

    match (instances, port) {
        ([only], None) => {
            tracing::info!(
                "port is not specified, guessing {} for host {}",
                only.port,
                host
            );
            Ok(only.clone())
        }
        ([only], Some(port)) if only.port != port => Err(DispatchError::TargetNotFound(
            format!("host {} does not have port {}", host, port),
        )),
        (_, None) => Err(DispatchError::Argument(format!(
            "host {} runs {} instances, a port is required",
            host,
            instances.len()
        ))),
        (_, Some(port)) => instances
            .iter()
            .find(|node| node.port == port)
            .cloned()
            .ok_or_else(|| {
                DispatchError::TargetNotFound(format!(
                    "no index instance on host {} with port {}",
                    host, port
                ))
            }),
    }
}
