// SPDX-License-Identifier: MIT

//! redraft-rs - a bounded, resumable plan/research/draft/critique loop
//!
//! - [adk] - model and search adapters plus the fault-absorbing tool gateway
//! - [redraft] - the report workflow: state, steps, policy, engine, settings and API

pub mod adk;
pub mod redraft;
