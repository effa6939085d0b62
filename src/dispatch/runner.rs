//! Tracked task execution.
//!
//! A `DispatchRunner` runs one unit of work on its own tokio task and reports
//! its completion, success or failure to a [`SyncGroup`].

use super::sync_group::SyncGroup;
use crate::command::Command;
use crate::error::{DispatchError, Result};

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Decrements the group however the task ends, recording a panic as a
/// failure.
struct CompletionGuard {
    group: Arc<SyncGroup>,
    label: String,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("task {} panicked", self.label);
            self.group
                .record_failure(DispatchError::TaskPanicked(self.label.clone()));
        }
        self.group.decrement();
    }
}

pub struct DispatchRunner {
    group: Arc<SyncGroup>,
}

impl DispatchRunner {
    pub fn new(group: Arc<SyncGroup>) -> Self {
        Self { group }
    }

    pub fn group(&self) -> &Arc<SyncGroup> {
        &self.group
    }

    /// Registers and starts `command` against its node.
    pub fn spawn(&self, command: Command) -> JoinHandle<()> {
        let label = format!("{}@{}", command.kind(), command.client().address());
        self.spawn_task(label, async move { command.run().await })
    }

    /// Registers `work` with the group, then runs it on a new task.
    ///
    /// The increment happens here, on the caller's side, before the task
    /// exists.
    pub fn spawn_task<F>(&self, label: String, work: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        self.group.increment();
        let group = self.group.clone();

        tokio::spawn(async move {
            let _guard = CompletionGuard {
                group: group.clone(),
                label: label.clone(),
            };

            match work.await {
                Ok(response) => {
                    tracing::debug!("{} finished ({} bytes)", label, response.len());
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", label, e);
                    group.record_failure(e);
                }
            }
        })
    }
}
