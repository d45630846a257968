// SPDX-License-Identifier: MIT

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod search;
pub mod server;
pub mod workflow;
