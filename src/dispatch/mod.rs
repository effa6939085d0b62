//! Dispatch Engine Module
//!
//! Fans commands out to the nodes of the cluster and joins them again.
//!
//! ## Concurrency Model
//! 1. **One task per unit of work**: a uniform command per node, or one chunk
//!    upload, each on its own tokio task.
//! 2. **Barrier per wave**: every task of a wave is registered with a
//!    `SyncGroup` before it starts; the caller waits for the group to drain
//!    before starting anything else.
//! 3. **First failure wins**: the group keeps the first task error and the
//!    command returns it once the wave has drained. Work already applied on
//!    other nodes is not rolled back.
//!
//! ## Submodules
//! - **`sync_group`**: the fan-out barrier.
//! - **`runner`**: `DispatchRunner`, spawns tracked tasks.
//! - **`chunker`**: tab-separated source reading and input file listing.
//! - **`dist`**: `DistCommand`, target resolution and the bulk algorithms.

pub mod chunker;
pub mod dist;
pub mod runner;
pub mod sync_group;

pub use dist::{DistCommand, DistCommandKind, DistPhase, resolve_targets};
pub use runner::DispatchRunner;
pub use sync_group::SyncGroup;
