// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod server;
pub mod workflow;
