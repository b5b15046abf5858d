// SPDX-License-Identifier: MIT

//! Continuation policy evaluated at the branch point after `generate`

use crate::redraft::workflow::state::WorkflowState;

/// Why a run stopped looping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `revision_count` reached `max_revisions`
    Completed,
    /// `loop_counter` passed the safety limit without the revision budget being reached
    SafetyValve,
}

/// Outcome of one branch evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Running,
    Terminated(StopReason),
}

/// Stop/loop rule with a safety valve on the number of evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationPolicy {
    /// Lowest safety limit regardless of the revision budget
    pub safety_floor: u32,
    /// Evaluations allowed per requested revision
    pub safety_multiplier: u32,
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self {
            safety_floor: 10,
            safety_multiplier: 4,
        }
    }
}

impl ContinuationPolicy {
    pub fn safety_limit(&self, max_revisions: u32) -> u32 {
        self.safety_floor
            .max(max_revisions.saturating_mul(self.safety_multiplier))
    }

    /// Count this evaluation, then decide
    pub fn evaluate(&self, state: &mut WorkflowState) -> Decision {
        state.loop_counter = state.loop_counter.saturating_add(1);

        if state.revision_count >= state.max_revisions {
            return Decision::Terminated(StopReason::Completed);
        }

        let limit = self.safety_limit(state.max_revisions);
        // A saturated counter can never pass a saturated limit
        if state.loop_counter > limit || state.loop_counter == u32::MAX {
            log::error!(
                "Loop counter {} exceeded safety limit {} with revision {}/{}",
                state.loop_counter,
                limit,
                state.revision_count,
                state.max_revisions
            );
            return Decision::Terminated(StopReason::SafetyValve);
        }

        Decision::Running
    }
}
