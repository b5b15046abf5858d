// SPDX-License-Identifier: MIT

//! Agent development kit - external collaborators behind uniform traits
//!
//! - [model] - completion clients returning raw provider responses
//! - [search] - web search providers
//! - [gateway] - timeout/retry wrapper that turns every failure into a [gateway::ToolFault]

pub mod error;
pub mod gateway;
pub mod model;
pub mod search;
