//! Command Factory
//!
//! Maps a `(node, command name, argument)` triple to a ready-to-run
//! [`Command`]. The name table lives in [`CommandKind`]; this module checks
//! the argument against it and binds a client with the right read timeout.

use super::executor::Command;
use super::types::CommandKind;
use crate::client::IndexServiceClient;
use crate::config::ClientConfig;
use crate::error::{DispatchError, Result};
use crate::topology::Node;

/// Builds commands against any node with one set of client timeouts.
#[derive(Debug, Clone, Default)]
pub struct CommandFactory {
    config: ClientConfig,
}

impl CommandFactory {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn create(&self, node: &Node, name: &str, argument: Option<&str>) -> Result<Command> {
        self.create_for_address(&node.host, node.port, name, argument)
    }

    /// Same as [`create`](Self::create) for an instance outside any topology.
    pub fn create_for_address(
        &self,
        host: &str,
        port: u16,
        name: &str,
        argument: Option<&str>,
    ) -> Result<Command> {
        let kind = parse_command(name)?;
        let argument = check_argument(kind, argument)?;

        let client = IndexServiceClient::new(host, port, &self.config)?
            .with_read_timeout(kind.read_timeout(&self.config))?;

        tracing::debug!("created {} for {}:{}", kind, host, port);
        Ok(Command::new(kind, argument, client))
    }
}

pub fn parse_command(name: &str) -> Result<CommandKind> {
    CommandKind::from_name(name).ok_or_else(|| DispatchError::UnknownCommand(name.to_string()))
}

/// Drops empty arguments and rejects a missing one when `kind` needs it.
pub fn check_argument(kind: CommandKind, argument: Option<&str>) -> Result<Option<String>> {
    let argument = argument.filter(|a| !a.is_empty()).map(str::to_string);
    if kind.requires_argument() && argument.is_none() {
        return Err(DispatchError::Argument(format!(
            "command {} requires an argument",
            kind
        )));
    }
    Ok(argument)
}
