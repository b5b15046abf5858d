// SPDX-License-Identifier: MIT

//! Durable per-step snapshots of a run
//!
//! Stores are append-only: each `(run_id, sequence)` key is written once and
//! a second write for the same key is rejected.
//! - [memory] - in-process map, lost on exit
//! - [file] - one JSON file per checkpoint under a root directory

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use crate::redraft::error::CheckpointError;
use crate::redraft::workflow::graph::{RunStatus, StepId};
use crate::redraft::workflow::state::WorkflowState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot persisted after a step completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    /// 0 for the initial snapshot, then one per completed step
    pub sequence: u64,
    /// Last completed step; `None` for the initial snapshot
    pub step: Option<StepId>,
    /// Step to schedule on resume; `None` once terminated
    pub next: Option<StepId>,
    pub status: RunStatus,
    pub state: WorkflowState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        run_id: impl Into<String>,
        sequence: u64,
        step: Option<StepId>,
        next: Option<StepId>,
        status: RunStatus,
        state: WorkflowState,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            sequence,
            step,
            next,
            status,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Append-only checkpoint storage shared by every run of an engine
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist `checkpoint`; fails with `SequenceExists` if the key is taken
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Highest-sequence checkpoint of a run
    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// All checkpoints of a run in sequence order; empty for unknown runs
    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>, CheckpointError>;

    /// Ids of every run with at least one checkpoint, sorted
    async fn runs(&self) -> Result<Vec<String>, CheckpointError>;
}
