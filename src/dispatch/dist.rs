//! Cluster-wide Commands
//!
//! A `DistCommand` applies one command to a set of nodes selected by a target
//! expression. Two families exist:
//! - **Uniform**: the same command goes unchanged to every target, one task
//!   per node, joined by a single [`SyncGroup`].
//! - **Bulk**: tab-separated sources are cut into chunks that are spread
//!   round-robin over the targets in sequential waves of bounded size.
//!   `updateDir` and `batchDelete` first delete every row of a source by id.
//!
//! ## Lifecycle
//! `Created -> ResolvingTargets -> Dispatching <-> Draining -> Succeeded | Failed`

use super::chunker::{TsvChunkReader, list_input_files};
use super::runner::DispatchRunner;
use super::sync_group::SyncGroup;
use crate::command::{CommandFactory, CommandKind};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::topology::{Node, NodeDatabase};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TARGET_MASTER: &str = "master";
pub const TARGET_SLAVE: &str = "slave";
pub const TARGET_ALL: &str = "all";

/// Single-node commands that may be sent unchanged to a whole target.
pub const UNIFORM_COMMANDS: [CommandKind; 7] = [
    CommandKind::AddFile,
    CommandKind::Commit,
    CommandKind::Delete,
    CommandKind::DeleteAll,
    CommandKind::Optimize,
    CommandKind::Ping,
    CommandKind::SoftCommit,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistPhase {
    Created,
    ResolvingTargets,
    Dispatching,
    Draining,
    Succeeded,
    Failed,
}

impl fmt::Display for DistPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DistPhase::Created => "CREATED",
            DistPhase::ResolvingTargets => "RESOLVING_TARGETS",
            DistPhase::Dispatching => "DISPATCHING",
            DistPhase::Draining => "DRAINING",
            DistPhase::Succeeded => "SUCCEEDED",
            DistPhase::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistCommandKind {
    Uniform(CommandKind),
    /// Bulk-add every source.
    AddDir,
    /// Delete every row of each source by id, then bulk-add it.
    UpdateDir,
    /// Delete every row of each source by id.
    BatchDelete,
}

impl DistCommandKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "addDir" => Ok(DistCommandKind::AddDir),
            "updateDir" => Ok(DistCommandKind::UpdateDir),
            "batchDelete" => Ok(DistCommandKind::BatchDelete),
            _ => CommandKind::from_name(name)
                .filter(|kind| UNIFORM_COMMANDS.contains(kind))
                .map(DistCommandKind::Uniform)
                .ok_or_else(|| DispatchError::UnknownCommand(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistCommandKind::Uniform(kind) => kind.name(),
            DistCommandKind::AddDir => "addDir",
            DistCommandKind::UpdateDir => "updateDir",
            DistCommandKind::BatchDelete => "batchDelete",
        }
    }

    pub fn requires_argument(&self) -> bool {
        match self {
            DistCommandKind::Uniform(kind) => kind.requires_argument(),
            _ => true,
        }
    }
}

/// Turns a target expression into nodes: `master`, `slave`, `all`, or a
/// comma-separated list of node names resolved in the listed order.
///
/// Fails as a whole if any listed name is unknown.
pub fn resolve_targets(database: &NodeDatabase, target: &str) -> Result<Vec<Arc<Node>>> {
    let nodes = match target.trim() {
        TARGET_MASTER => database.masters().to_vec(),
        TARGET_SLAVE => database.slaves().to_vec(),
        TARGET_ALL => database.nodes().to_vec(),
        "" => {
            return Err(DispatchError::TargetNotFound(
                "no target specified".to_string(),
            ));
        }
        names => names
            .split(',')
            .map(str::trim)
            .map(|name| {
                database.node_by_name(name).cloned().ok_or_else(|| {
                    DispatchError::TargetNotFound(format!("no instance named {}", name))
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    if nodes.is_empty() {
        return Err(DispatchError::TargetNotFound(format!(
            "target {} has no nodes",
            target
        )));
    }
    Ok(nodes)
}

pub struct DistCommand {
    target: String,
    kind: DistCommandKind,
    argument: Option<String>,
    database: Arc<NodeDatabase>,
    config: DispatchConfig,
    factory: CommandFactory,
    phase: DistPhase,
}

impl DistCommand {
    /// Validates the command name and argument. Targets are resolved later,
    /// by [`execute`](Self::execute).
    pub fn create(
        target: &str,
        name: &str,
        argument: Option<&str>,
        database: Arc<NodeDatabase>,
        config: DispatchConfig,
    ) -> Result<Self> {
        let kind = DistCommandKind::from_name(name)?;
        let argument = argument.filter(|a| !a.is_empty()).map(str::to_string);
        if kind.requires_argument() && argument.is_none() {
            return Err(DispatchError::Argument(format!(
                "{} requires an argument. Please specify --arg option and value.",
                name
            )));
        }
        config.validate()?;

        Ok(Self {
            target: target.to_string(),
            kind,
            argument,
            database,
            factory: CommandFactory::new(config.client.clone()),
            config,
            phase: DistPhase::Created,
        })
    }

    pub fn kind(&self) -> DistCommandKind {
        self.kind
    }

    pub fn phase(&self) -> DistPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: DistPhase) {
        if self.phase != phase {
            tracing::debug!("{}: {} -> {}", self.kind.name(), self.phase, phase);
            self.phase = phase;
        }
    }

    /// Runs the command to completion and reports the first failure.
    pub async fn execute(&mut self) -> Result<()> {
        let result = self.execute_phases().await;
        match &result {
            Ok(()) => {
                self.set_phase(DistPhase::Succeeded);
                tracing::info!("{} on {} succeeded", self.kind.name(), self.target);
            }
            Err(e) => {
                self.set_phase(DistPhase::Failed);
                tracing::error!("{} on {} failed: {}", self.kind.name(), self.target, e);
            }
        }
        result
    }

    async fn execute_phases(&mut self) -> Result<()> {
        self.set_phase(DistPhase::ResolvingTargets);
        let targets = resolve_targets(&self.database, &self.target)?;
        tracing::info!(
            "{} on {} resolved to {} node(s)",
            self.kind.name(),
            self.target,
            targets.len()
        );

        match self.kind {
            DistCommandKind::Uniform(kind) => self.dispatch_uniform(kind, &targets).await,
            DistCommandKind::AddDir => {
                for file in self.input_files().await? {
                    self.add_file(&file, &targets).await?;
                }
                Ok(())
            }
            DistCommandKind::UpdateDir => {
                for file in self.input_files().await? {
                    self.delete_file(&file, &targets).await?;
                    self.add_file(&file, &targets).await?;
                }
                Ok(())
            }
            DistCommandKind::BatchDelete => {
                for file in self.input_files().await? {
                    self.delete_file(&file, &targets).await?;
                }
                Ok(())
            }
        }
    }

    async fn input_files(&self) -> Result<Vec<PathBuf>> {
        let source = PathBuf::from(self.argument.clone().unwrap_or_default());
        list_input_files(&source).await
    }

    /// Builds one command per target, then starts them all on a fresh group.
    fn spawn_on_targets(
        &self,
        kind: CommandKind,
        argument: Option<&str>,
        targets: &[Arc<Node>],
    ) -> Result<DispatchRunner> {
        let commands = targets
            .iter()
            .map(|node| self.factory.create(node, kind.name(), argument))
            .collect::<Result<Vec<_>>>()?;

        let runner = DispatchRunner::new(SyncGroup::new());
        for command in commands {
            runner.spawn(command);
        }
        Ok(runner)
    }

    async fn dispatch_uniform(&mut self, kind: CommandKind, targets: &[Arc<Node>]) -> Result<()> {
        self.set_phase(DistPhase::Dispatching);
        let argument = self.argument.clone();
        let runner = self.spawn_on_targets(kind, argument.as_deref(), targets)?;

        self.set_phase(DistPhase::Draining);
        runner.group().drain().await
    }

    /// Distributes one source in waves of at most `worker_count` chunk uploads.
    /// Chunk `i` of the source goes to `targets[i % targets.len()]`.
    async fn add_file(&mut self, path: &Path, targets: &[Arc<Node>]) -> Result<()> {
        let mut reader = TsvChunkReader::open(path).await?;
        let worker_count = self.config.worker_count(targets.len());
        tracing::info!(
            "adding {} to {} node(s), {} upload(s) per wave",
            path.display(),
            targets.len(),
            worker_count
        );

        let mut chunk_index = 0usize;
        loop {
            self.set_phase(DistPhase::Dispatching);
            let runner = DispatchRunner::new(SyncGroup::new());
            let filled = self
                .fill_wave(&mut reader, &runner, targets, worker_count, &mut chunk_index)
                .await;

            self.set_phase(DistPhase::Draining);
            runner.group().drain().await?;
            if filled? {
                break;
            }
        }

        tracing::info!("{}: {} chunk(s) sent", path.display(), chunk_index);
        Ok(())
    }

    /// Starts up to `worker_count` uploads. Returns `true` once the source is
    /// exhausted.
    async fn fill_wave<R>(
        &self,
        reader: &mut TsvChunkReader<R>,
        runner: &DispatchRunner,
        targets: &[Arc<Node>],
        worker_count: usize,
        chunk_index: &mut usize,
    ) -> Result<bool>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        for _ in 0..worker_count {
            let Some(chunk) = reader.next_chunk(self.config.max_lines_per_chunk).await? else {
                return Ok(true);
            };
            let node = &targets[*chunk_index % targets.len()];
            *chunk_index += 1;

            let command = self
                .factory
                .create(node, CommandKind::AddData.name(), Some(&chunk))?;
            runner.spawn(command);
        }
        Ok(false)
    }

    /// Sends `delete <id field>:<id>` for every row of `path` to all targets,
    /// one row at a time.
    async fn delete_file(&mut self, path: &Path, targets: &[Arc<Node>]) -> Result<()> {
        let mut reader = TsvChunkReader::open(path).await?;
        let id_field = reader.id_field().to_string();
        tracing::info!("deleting rows of {} by {}", path.display(), id_field);

        let mut deleted = 0usize;
        while let Some(row) = reader.next_row().await? {
            let id = row.split('\t').next().unwrap_or_default();
            if id.is_empty() {
                tracing::warn!("skipping row without {}: {}", id_field, row);
                continue;
            }

            // The id is not escaped for the query syntax; ids with spaces or
            // ':' select other documents.
            let query = format!("{}:{}", id_field, id);
            self.set_phase(DistPhase::Dispatching);
            let runner = self.spawn_on_targets(CommandKind::Delete, Some(&query), targets)?;
            self.set_phase(DistPhase::Draining);
            runner.group().drain().await?;
            deleted += 1;
        }

        tracing::info!("{}: {} row(s) deleted", path.display(), deleted);
        Ok(())
    }
}
