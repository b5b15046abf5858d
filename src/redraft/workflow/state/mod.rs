// SPDX-License-Identifier: MIT

//! State management for the report workflow
//!
//! This module provides:
//! - `WorkflowState` - the record threaded through every step
//! - `StateUpdate` - the sparse update a step returns, merged with per-field reducers
//! - `CorpusStats` - word and sentence figures over the gathered evidence

mod stats;
mod store;

pub use stats::CorpusStats;
pub use store::{StateUpdate, WorkflowState, NO_DRAFT};
