// SPDX-License-Identifier: MIT

pub mod checkpoint;
pub mod graph;
pub mod parser;
pub mod policy;
pub mod prompts;
pub mod state;
pub mod steps;
