// SPDX-License-Identifier: MIT

//! Checkpoints as JSON files: `<root>/<run_id>/<sequence:010>.json`

use super::{Checkpoint, CheckpointStore};
use crate::redraft::error::CheckpointError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Checkpoint files under a root directory, one subdirectory per run
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf, CheckpointError> {
        CheckpointError::validate_run_id(run_id)?;
        Ok(self.root.join(run_id))
    }

    fn file_name(sequence: u64) -> String {
        format!("{:010}.json", sequence)
    }

    /// Sequence numbers present for a run, ascending
    async fn sequences(&self, run_id: &str) -> Result<Vec<u64>, CheckpointError> {
        let dir = self.run_dir(run_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sequences = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // Skips in-flight temp files, which start with '.'
            if let Some(seq) = name
                .strip_suffix(".json")
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                sequences.push(seq);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }

    async fn read(&self, run_id: &str, sequence: u64) -> Result<Checkpoint, CheckpointError> {
        let path = self.run_dir(run_id)?.join(Self::file_name(sequence));
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn write_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.sync_all().await
}

/// Remove a temp file; a leftover is harmless, so failures are only logged
async fn discard_temp(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove temp file {}: {}", path.display(), e),
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let dir = self.run_dir(&checkpoint.run_id)?;
        tokio::fs::create_dir_all(&dir).await?;

        let name = Self::file_name(checkpoint.sequence);
        let path = dir.join(&name);
        let tmp_path = dir.join(format!(".{}.tmp-{}", name, uuid::Uuid::new_v4()));

        let body = serde_json::to_vec_pretty(checkpoint)?;
        if let Err(e) = write_synced(&tmp_path, &body).await {
            discard_temp(&tmp_path).await;
            return Err(e.into());
        }

        // Publishing with a hard link fails instead of replacing an existing checkpoint
        let published = tokio::fs::hard_link(&tmp_path, &path).await;
        discard_temp(&tmp_path).await;
        match published {
            Ok(()) => {
                log::debug!("Wrote checkpoint {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(CheckpointError::SequenceExists {
                run_id: checkpoint.run_id.clone(),
                sequence: checkpoint.sequence,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.sequences(run_id).await?.last() {
            Some(&seq) => Ok(Some(self.read(run_id, seq).await?)),
            None => Ok(None),
        }
    }

    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let mut checkpoints = Vec::new();
        for seq in self.sequences(run_id).await? {
            checkpoints.push(self.read(run_id, seq).await?);
        }
        Ok(checkpoints)
    }

    async fn runs(&self) -> Result<Vec<String>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Ok(id) = entry.file_name().into_string() else {
                continue;
            };
            if CheckpointError::validate_run_id(&id).is_ok() && !self.sequences(&id).await?.is_empty()
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redraft::workflow::graph::{RunStatus, StepId};
    use crate::redraft::workflow::state::WorkflowState;

    fn checkpoint(run_id: &str, sequence: u64, draft: &str) -> Checkpoint {
        let mut state = WorkflowState::new("EU inflation", 2);
        state.draft = draft.to_string();
        Checkpoint::new(
            run_id,
            sequence,
            Some(StepId::Generate),
            Some(StepId::Reflect),
            RunStatus::Running,
            state,
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        let written = checkpoint("run-1", 0, "first");
        store.put(&written).await.unwrap();
        store.put(&checkpoint("run-1", 1, "second")).await.unwrap();

        let latest = store.latest("run-1").await.unwrap().unwrap();
        assert_eq!(latest.sequence, 1);
        assert_eq!(latest.state.draft, "second");

        let history = store.history("run-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], written);

        assert!(dir.path().join("run-1").join("0000000001.json").exists());
    }

    #[tokio::test]
    async fn test_existing_sequence_is_rejected_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.put(&checkpoint("run-1", 0, "original")).await.unwrap();
        let err = store
            .put(&checkpoint("run-1", 0, "overwrite"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::SequenceExists { .. }));

        let kept = store.latest("run-1").await.unwrap().unwrap();
        assert_eq!(kept.state.draft, "original");

        // No temp files left behind
        let leftovers = std::fs::read_dir(dir.path().join("run-1"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_temp_cleanup_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join(".0000000000.json.tmp-x");

        write_synced(&tmp, b"{}").await.unwrap();
        // A second create_new on the same path fails, like any interrupted write
        assert!(write_synced(&tmp, b"{}").await.is_err());

        discard_temp(&tmp).await;
        assert!(!tmp.exists());
        discard_temp(&tmp).await;
    }

    #[tokio::test]
    async fn test_runs_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("not-created-yet"));
        assert_eq!(store.root(), dir.path().join("not-created-yet"));
        assert!(store.runs().await.unwrap().is_empty());
        assert!(store.latest("run-1").await.unwrap().is_none());

        store.put(&checkpoint("b", 0, "")).await.unwrap();
        store.put(&checkpoint("a", 0, "")).await.unwrap();
        assert_eq!(store.runs().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let err = store.put(&checkpoint("../x", 0, "")).await.unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidRunId(_)));
        assert!(matches!(
            store.history("a/b").await,
            Err(CheckpointError::InvalidRunId(_))
        ));
    }
}
