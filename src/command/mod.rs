//! Single-Node Command Module
//!
//! Commands are the unit of work the dispatcher fans out: each one targets a
//! single index instance and issues one request (or, for refused bulk bodies,
//! one request per line).
//!
//! ## Submodules
//! - **`types`**: `CommandKind`, the fixed table of names, argument
//!   requirements and read timeouts.
//! - **`factory`**: `CommandFactory`, validation and construction.
//! - **`executor`**: `Command::run`, including the line-by-line fallback.

pub mod executor;
pub mod factory;
pub mod types;

pub use executor::Command;
pub use factory::CommandFactory;
pub use types::CommandKind;
