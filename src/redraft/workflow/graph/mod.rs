// SPDX-License-Identifier: MIT

//! Workflow graph - fixed topology and the engine that walks it

pub mod executor;
pub mod types;

pub use executor::{branch, RunOutcome, StepEvent, WorkflowEngine};
pub use types::{successor, Edge, RunStatus, StepId, ENTRY, LOOP_ENTRY};
