// SPDX-License-Identifier: MIT

//! drafter-rs: an iterative plan / research / draft / critique workflow with
//! durable, retrying checkpoints.

pub mod adk;
pub mod drafter;
