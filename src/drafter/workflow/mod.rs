// SPDX-License-Identifier: MIT

//! The drafting workflow: state, node functions and the graph that drives them

pub mod graph;
pub mod prompts;
pub mod queries;
pub mod state;
pub mod steps;

pub use graph::{DraftGraph, Phase, RunEvent};
pub use prompts::Prompts;
pub use state::{StateUpdate, WorkflowState};
pub use steps::{StepContext, StepSettings};
