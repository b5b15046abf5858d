// SPDX-License-Identifier: MIT

use super::{Checkpoint, CheckpointStore};
use crate::redraft::error::CheckpointError;
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Checkpoints held in process memory
#[derive(Default)]
pub struct MemoryCheckpointStore {
    runs: RwLock<HashMap<String, BTreeMap<u64, Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        CheckpointError::validate_run_id(&checkpoint.run_id)?;

        let mut runs = self.runs.write().await;
        let run = runs.entry(checkpoint.run_id.clone()).or_default();
        match run.entry(checkpoint.sequence) {
            Entry::Occupied(_) => Err(CheckpointError::SequenceExists {
                run_id: checkpoint.run_id.clone(),
                sequence: checkpoint.sequence,
            }),
            Entry::Vacant(slot) => {
                slot.insert(checkpoint.clone());
                Ok(())
            }
        }
    }

    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let runs = self.runs.read().await;
        Ok(runs
            .get(run_id)
            .and_then(|run| run.values().next_back())
            .cloned())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let runs = self.runs.read().await;
        Ok(runs
            .get(run_id)
            .map(|run| run.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn runs(&self) -> Result<Vec<String>, CheckpointError> {
        let runs = self.runs.read().await;
        let mut ids: Vec<String> = runs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
