//! Fan-out Barrier
//!
//! A `SyncGroup` counts the tasks of one dispatch wave and releases waiters
//! once every registered task has finished. It also keeps the first failure
//! reported by any of those tasks; later failures are logged and dropped.
//!
//! The dispatcher registers a task with [`SyncGroup::increment`] *before*
//! spawning it, so the counter can never reach zero while tasks of the wave
//! are still being started.

use crate::error::{DispatchError, Result};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct GroupState {
    outstanding: usize,
    first_failure: Option<DispatchError>,
}

#[derive(Debug, Default)]
pub struct SyncGroup {
    state: Mutex<GroupState>,
    drained: Notify,
}

impl SyncGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers one more outstanding task.
    pub fn increment(&self) {
        self.lock().outstanding += 1;
    }

    /// Marks one task as finished and wakes waiters when none remain.
    pub fn decrement(&self) {
        let mut state = self.lock();
        if state.outstanding == 0 {
            tracing::warn!("sync group decremented below zero, ignoring");
            return;
        }
        state.outstanding -= 1;
        let drained = state.outstanding == 0;
        drop(state);

        if drained {
            self.drained.notify_waiters();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Keeps `error` if it is the first failure of the group.
    ///
    /// Returns `false` when an earlier failure was already recorded.
    pub fn record_failure(&self, error: DispatchError) -> bool {
        let mut state = self.lock();
        if state.first_failure.is_some() {
            tracing::debug!("discarding later failure: {}", error);
            return false;
        }
        state.first_failure = Some(error);
        true
    }

    pub fn has_failed(&self) -> bool {
        self.lock().first_failure.is_some()
    }

    pub fn take_failure(&self) -> Option<DispatchError> {
        self.lock().first_failure.take()
    }

    /// Resolves once the outstanding count is zero. Returns immediately for a
    /// group that was never incremented.
    pub async fn wait_until_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Must be registered before the count is read.
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Waits for the group and turns its first failure, if any, into the result.
    pub async fn drain(&self) -> Result<()> {
        self.wait_until_drained().await;
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
