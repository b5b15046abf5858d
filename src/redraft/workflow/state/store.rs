// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::{Deserialize, Serialize};

use super::stats::CorpusStats;

/// Sentinel returned when a run ends without any draft text
pub const NO_DRAFT: &str = "[no draft produced]";

/// The full state of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// User goal, fixed at run creation
    pub task: String,
    pub plan: String,
    pub draft: String,
    pub critique: String,
    /// Append-only, chronological
    pub evidence: Vec<String>,
    pub revision_count: u32,
    pub max_revisions: u32,
    /// Branch evaluations so far
    pub loop_counter: u32,
    pub stats: Option<CorpusStats>,
}

/// Fields a step changed; everything else is left alone
///
/// Reducers: `plan`, `draft`, `critique` and `stats` overwrite, `evidence`
/// appends and `revision_count` keeps the maximum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub plan: Option<String>,
    pub draft: Option<String>,
    pub critique: Option<String>,
    pub evidence: Vec<String>,
    pub revision_count: Option<u32>,
    pub stats: Option<CorpusStats>,
}

impl StateUpdate {
    pub fn plan(text: impl Into<String>) -> Self {
        Self {
            plan: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn critique(text: impl Into<String>) -> Self {
        Self {
            critique: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn evidence(entries: Vec<String>) -> Self {
        Self {
            evidence: entries,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl WorkflowState {
    /// Fresh state for a new run
    pub fn new(task: impl Into<String>, max_revisions: u32) -> Self {
        Self {
            task: task.into(),
            max_revisions,
            ..Self::default()
        }
    }

    /// Merge a step's update using each field's reducer
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        if let Some(draft) = update.draft {
            self.draft = draft;
        }
        if let Some(critique) = update.critique {
            self.critique = critique;
        }
        self.evidence.extend(update.evidence);
        if let Some(count) = update.revision_count {
            // Never lets the counter move backwards
            self.revision_count = self.revision_count.max(count);
        }
        if let Some(stats) = update.stats {
            self.stats = Some(stats);
        }
    }

    /// Evidence joined the way prompts consume it
    pub fn joined_evidence(&self) -> String {
        self.evidence.join("\n\n")
    }

    /// The draft to hand back to the caller
    pub fn final_draft(&self) -> String {
        if self.revision_count == 0 || self.draft.trim().is_empty() {
            NO_DRAFT.to_string()
        } else {
            self.draft.clone()
        }
    }
}
