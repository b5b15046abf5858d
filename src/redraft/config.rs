// SPDX-License-Identifier: MIT

//! Settings - YAML file with serde defaults, overridden by CLI flags
//!
//! ```yaml
//! model:
//!   name: openai/gpt-oss-20b
//!   temperature: 0.0
//! search:
//!   backend: tavily
//!   max_results: 2
//! gateway:
//!   timeout_secs: 60
//!   retries: 1
//! workflow:
//!   max_revisions: 2
//!   auxiliary_path: data/auxiliary.txt
//! checkpoint:
//!   backend: file
//!   dir: .redraft/checkpoints
//! ```

use crate::adk::gateway::{GatewayConfig, ToolGateway};
use crate::adk::model::{self, Provider};
use crate::adk::search::{self, SearchBackend};
use crate::redraft::error::{ConfigError, RedraftError};
use crate::redraft::workflow::checkpoint::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
use crate::redraft::workflow::graph::WorkflowEngine;
use crate::redraft::workflow::policy::ContinuationPolicy;
use crate::redraft::workflow::steps::{StepSet, StepSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Settings file read when no `--config` is given
pub const DEFAULT_SETTINGS_FILE: &str = "redraft.yaml";

/// Extra attempts allowed per external call
pub const MAX_RETRIES: u32 = 1;

/// Searches allowed per research step
pub const MAX_QUERIES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: ModelSettings,
    pub search: SearchSettings,
    pub gateway: GatewaySettings,
    pub workflow: WorkflowSettings,
    pub checkpoint: CheckpointSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Inferred from `name` when absent
    pub provider: Option<Provider>,
    pub name: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: None,
            name: "openai/gpt-oss-20b".to_string(),
            temperature: Some(0.0),
            max_output_tokens: None,
        }
    }
}

impl ModelSettings {
    pub fn provider(&self) -> Provider {
        self.provider.unwrap_or_else(|| Provider::infer(&self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub backend: SearchBackend,
    pub max_results: u32,
    pub max_queries: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            max_results: 2,
            max_queries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub timeout_secs: u64,
    pub retries: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub max_revisions: u32,
    pub auxiliary_path: PathBuf,
    pub safety_floor: u32,
    pub safety_multiplier: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        let policy = ContinuationPolicy::default();
        Self {
            max_revisions: 2,
            auxiliary_path: PathBuf::from("data/auxiliary.txt"),
            safety_floor: policy.safety_floor,
            safety_multiplier: policy.safety_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    pub backend: CheckpointBackend,
    pub dir: PathBuf,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            dir: PathBuf::from(".redraft/checkpoints"),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `redraft.yaml` if it exists
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()));
                }
                Self::parse_yaml(&std::fs::read_to_string(path)?)?
            }
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.exists() {
                    log::info!("Loading settings from {}", DEFAULT_SETTINGS_FILE);
                    Self::parse_yaml(&std::fs::read_to_string(default)?)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a YAML string; absent fields take defaults
    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::invalid("model.name must not be empty"));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::invalid("gateway.timeout_secs must be positive"));
        }
        if self.gateway.retries > MAX_RETRIES {
            return Err(ConfigError::invalid(format!(
                "gateway.retries must be at most {}",
                MAX_RETRIES
            )));
        }
        if self.search.max_queries == 0 || self.search.max_queries > MAX_QUERIES {
            return Err(ConfigError::invalid(format!(
                "search.max_queries must be between 1 and {}",
                MAX_QUERIES
            )));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::invalid("search.max_results must be at least 1"));
        }
        if self.workflow.safety_floor == 0 {
            return Err(ConfigError::invalid(
                "workflow.safety_floor must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            timeout: Duration::from_secs(self.gateway.timeout_secs),
            retries: self.gateway.retries,
            temperature: self.model.temperature,
        }
    }

    pub fn step_settings(&self) -> StepSettings {
        StepSettings {
            auxiliary_path: self.workflow.auxiliary_path.clone(),
            max_queries: self.search.max_queries,
            results_per_query: self.search.max_results,
            max_output_tokens: self.model.max_output_tokens,
        }
    }

    pub fn policy(&self) -> ContinuationPolicy {
        ContinuationPolicy {
            safety_floor: self.workflow.safety_floor,
            safety_multiplier: self.workflow.safety_multiplier,
        }
    }

    pub fn checkpoint_store(&self) -> Arc<dyn CheckpointStore> {
        match self.checkpoint.backend {
            CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
            CheckpointBackend::File => {
                let store = FileCheckpointStore::new(self.checkpoint.dir.clone());
                log::info!("Checkpoints stored under {}", store.root().display());
                Arc::new(store)
            }
        }
    }

    /// Engine backed by the configured providers, reading API keys from the environment
    pub fn build_engine(&self) -> Result<WorkflowEngine, RedraftError> {
        let model = model::build(self.model.provider(), self.model.name.clone())?;
        let search = search::build(self.search.backend)?;
        let gateway = Arc::new(ToolGateway::new(model, search, self.gateway_config()));
        let steps = StepSet::standard(gateway, &self.step_settings());
        Ok(WorkflowEngine::new(
            steps,
            self.checkpoint_store(),
            self.policy(),
        )?)
    }
}
