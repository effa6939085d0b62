//! Error taxonomy shared by every subsystem.
//!
//! Configuration, argument and target errors are raised before any request
//! leaves the process. `Transport` and `PartialData` come from talking to an
//! index node and are told apart so the bulk path can degrade on the latter
//! while aborting on the former.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Malformed topology or settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A command that needs `--arg` was given none.
    #[error("Argument error: {0}")]
    Argument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// The node could not be reached, or the call timed out.
    #[error("Transport error on {node}: {message}")]
    Transport { node: String, message: String },

    /// The node answered but refused the body.
    #[error("Rejected by {node} (HTTP {status}): {body}")]
    PartialData {
        node: String,
        status: u16,
        body: String,
    },

    #[error("There are no files in: {0}")]
    NoInputFiles(String),

    #[error("Input file {0} has no content")]
    EmptySource(String),

    #[error("Dispatched task panicked: {0}")]
    TaskPanicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_partial_data(&self) -> bool {
        matches!(self, Self::PartialData { .. })
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
