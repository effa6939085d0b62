//! Index Cluster Dispatcher Library
//!
//! Manages a cluster of independent index-server instances as one logical
//! target: bulk loading, deleting, committing, optimizing and pinging on one
//! node, a role class of nodes, or an explicit list of them.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`topology`**: the static cluster description (nodes, roles, slave
//!   groups, replication masters), parsed once and read-only afterwards.
//! - **`client`**: HTTP access to a single index-server instance.
//! - **`command`**: single-node commands and the factory that validates them.
//! - **`dispatch`**: the fan-out engine. Runs commands concurrently across
//!   nodes, joins them with a barrier, and distributes bulk sources in
//!   bounded waves.
//! - **`config`**: client timeouts and bulk tunables.
//! - **`error`**: the shared error type.

pub mod client;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod topology;

#[cfg(test)]
pub(crate) mod testkit;
