// SPDX-License-Identifier: MIT

//! Typed error handling for redraft
//!
//! Only orchestration failures live here. Tool faults, parse degradation and
//! missing auxiliary files are absorbed inside the steps and never surface as
//! one of these.

use crate::adk::error::ProviderError;
use crate::redraft::workflow::graph::StepId;
use thiserror::Error;

/// Top-level error type for redraft
#[derive(Debug, Error)]
pub enum RedraftError {
    /// Configuration errors (missing env vars, invalid settings file)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Engine faults that abort a run
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Provider construction errors (missing API keys, unsupported provider)
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Faults that break the orchestration contract itself
#[derive(Debug, Error)]
pub enum EngineError {
    /// Persisting or loading a checkpoint failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A branch was evaluated after a step other than `generate`
    #[error("Cannot branch after step '{0}'; only 'generate' is a branch point")]
    InvalidBranch(StepId),

    /// The step set is missing one of the fixed topology's steps
    #[error("No implementation registered for step '{0}'")]
    MissingStep(StepId),

    /// Resume requested for a run with no checkpoints
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Start requested with a run id that already has checkpoints
    #[error("Run already exists: {0}")]
    RunExists(String),

    /// The run is already being driven by this engine
    #[error("Run is already executing: {0}")]
    RunActive(String),
}

/// Checkpoint store failures
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The store is append-only; a sequence number can be written once
    #[error("Checkpoint {sequence} already exists for run {run_id}")]
    SequenceExists { run_id: String, sequence: u64 },

    /// Run ids double as storage keys and must be a single path component
    #[error("Invalid run id: {0:?}")]
    InvalidRunId(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Settings loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Settings file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl CheckpointError {
    /// Reject run ids that are empty or could escape a storage directory
    pub fn validate_run_id(run_id: &str) -> Result<(), Self> {
        let ok = !run_id.is_empty()
            && run_id.len() <= 128
            && run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && run_id != "."
            && run_id != "..";
        if ok {
            Ok(())
        } else {
            Err(Self::InvalidRunId(run_id.to_string()))
        }
    }
}
