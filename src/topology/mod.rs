//! Cluster Topology Module
//!
//! Describes the static layout of the cluster: which index instances exist,
//! which roles they carry and who replicates from whom.
//!
//! ## Core Concepts
//! - **Node**: one `host:port` instance with a set of roles (master, slave,
//!   backup, obsolete merger), an optional replication master and a slave group.
//! - **NodeDatabase**: immutable snapshot with name/host lookups and per-role
//!   lists, validated once at construction.
//! - **References**: a topology entry may point at a node declared elsewhere to
//!   give it an additional role.
//!
//! ## Submodules
//! - **`types`**: `Node`, `Role` and `NodeDatabase`.
//! - **`parser`**: two-pass YAML document parser (`NodeDatabaseBuilder`).
//! - **`inspect`**: instance role detection and lookups used by the CLI.

pub mod inspect;
pub mod parser;
pub mod types;

pub use parser::NodeDatabaseBuilder;
pub use types::{DEFAULT_GROUP_NAME, Node, NodeDatabase, Role};
