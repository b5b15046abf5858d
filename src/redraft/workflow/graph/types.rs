// SPDX-License-Identifier: MIT

//! Fixed topology of the report workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven steps of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Plan,
    ResearchPlan,
    FetchAuxiliary,
    ComputeStatistics,
    Generate,
    Reflect,
    ResearchCritique,
}

impl StepId {
    pub const ALL: [StepId; 7] = [
        StepId::Plan,
        StepId::ResearchPlan,
        StepId::FetchAuxiliary,
        StepId::ComputeStatistics,
        StepId::Generate,
        StepId::Reflect,
        StepId::ResearchCritique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Plan => "plan",
            StepId::ResearchPlan => "research_plan",
            StepId::FetchAuxiliary => "fetch_auxiliary",
            StepId::ComputeStatistics => "compute_statistics",
            StepId::Generate => "generate",
            StepId::Reflect => "reflect",
            StepId::ResearchCritique => "research_critique",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where control goes after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Unconditional edge
    To(StepId),
    /// The continuation policy decides
    Branch,
}

/// First step of every run
pub const ENTRY: StepId = StepId::Plan;

/// Step scheduled when the policy keeps the loop running
pub const LOOP_ENTRY: StepId = StepId::Reflect;

/// Outgoing edge of `step`
pub fn successor(step: StepId) -> Edge {
    match step {
        StepId::Plan => Edge::To(StepId::ResearchPlan),
        StepId::ResearchPlan => Edge::To(StepId::FetchAuxiliary),
        StepId::FetchAuxiliary => Edge::To(StepId::ComputeStatistics),
        StepId::ComputeStatistics => Edge::To(StepId::Generate),
        StepId::Generate => Edge::Branch,
        StepId::Reflect => Edge::To(StepId::ResearchCritique),
        StepId::ResearchCritique => Edge::To(StepId::Generate),
    }
}

/// Lifecycle of a run as recorded in its checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// Revision budget reached
    Completed,
    /// Loop counter passed the safety limit
    SafetyValve,
    /// Stopped between steps on request; still resumable
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::SafetyValve)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::SafetyValve => write!(f, "safety_valve"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_back_edge() {
        // Walk from the entry; generate is the only branch and the loop re-enters it
        let mut step = ENTRY;
        let mut first_pass = vec![step];
        while let Edge::To(next) = successor(step) {
            first_pass.push(next);
            step = next;
        }
        assert_eq!(
            first_pass,
            vec![
                StepId::Plan,
                StepId::ResearchPlan,
                StepId::FetchAuxiliary,
                StepId::ComputeStatistics,
                StepId::Generate
            ]
        );

        assert_eq!(successor(LOOP_ENTRY), Edge::To(StepId::ResearchCritique));
        assert_eq!(
            successor(StepId::ResearchCritique),
            Edge::To(StepId::Generate)
        );

        let branches: Vec<_> = StepId::ALL
            .iter()
            .filter(|s| successor(**s) == Edge::Branch)
            .collect();
        assert_eq!(branches, vec![&StepId::Generate]);
    }

    #[test]
    fn test_step_id_serde_matches_display() {
        for step in StepId::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::SafetyValve.is_terminal());
        assert!(!RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
