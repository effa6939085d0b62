use crate::config::ClientConfig;

use std::fmt;
use std::time::Duration;

/// Every single-node command the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Bulk-upload a local tab-separated file.
    AddFile,
    /// Bulk-upload an in-memory tab-separated chunk.
    AddData,
    DeleteAll,
    /// Delete by query.
    Delete,
    Commit,
    SoftCommit,
    Optimize,
    Ping,
    /// Let the server ingest a file from its own filesystem.
    UpdateViaStreamFile,
}

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        CommandKind::AddFile,
        CommandKind::AddData,
        CommandKind::DeleteAll,
        CommandKind::Delete,
        CommandKind::Commit,
        CommandKind::SoftCommit,
        CommandKind::Optimize,
        CommandKind::Ping,
        CommandKind::UpdateViaStreamFile,
    ];

    /// Name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::AddFile => "addFile",
            CommandKind::AddData => "addData",
            CommandKind::DeleteAll => "deleteAll",
            CommandKind::Delete => "delete",
            CommandKind::Commit => "commit",
            CommandKind::SoftCommit => "softcommit",
            CommandKind::Optimize => "optimize",
            CommandKind::Ping => "ping",
            CommandKind::UpdateViaStreamFile => "updateViaStreamFile",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn requires_argument(&self) -> bool {
        matches!(
            self,
            CommandKind::AddFile
                | CommandKind::AddData
                | CommandKind::Delete
                | CommandKind::UpdateViaStreamFile
        )
    }

    /// Read timeout for the HTTP call this command makes.
    pub fn read_timeout(&self, config: &ClientConfig) -> Duration {
        match self {
            CommandKind::Commit | CommandKind::SoftCommit => config.commit_read_timeout(),
            CommandKind::Optimize => config.optimize_read_timeout(),
            CommandKind::UpdateViaStreamFile => config.stream_file_read_timeout(),
            _ => config.read_timeout(),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
