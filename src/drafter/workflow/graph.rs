// SPDX-License-Identifier: MIT

//! Drafting graph executor
//!
//! The topology is fixed:
//! `planner -> research_plan -> generate -> (end | reflect -> research_critique -> generate)`.
//! It is driven as a finite-state machine over [`Phase`]; every node's merged
//! state is checkpointed before the next transition is evaluated.

use super::state::{StateUpdate, WorkflowState};
use super::steps::{self, StepContext};
use crate::drafter::checkpoint::{CheckpointKey, Checkpointer};
use crate::drafter::error::DrafterError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    ResearchingPlan,
    Generating,
    Reflecting,
    ResearchingCritique,
    Terminated,
}

impl Phase {
    pub const INITIAL: Phase = Phase::Planning;

    /// Node executed in this phase; `None` once terminated
    pub fn node(&self) -> Option<&'static str> {
        match self {
            Phase::Planning => Some("planner"),
            Phase::ResearchingPlan => Some("research_plan"),
            Phase::Generating => Some("generate"),
            Phase::Reflecting => Some("reflect"),
            Phase::ResearchingCritique => Some("research_critique"),
            Phase::Terminated => None,
        }
    }

    /// Transition taken after this phase's node has run on `state`
    pub fn next(self, state: &WorkflowState) -> Phase {
        match self {
            Phase::Planning => Phase::ResearchingPlan,
            Phase::ResearchingPlan => Phase::Generating,
            Phase::Generating if state.revisions_exhausted() => Phase::Terminated,
            Phase::Generating => Phase::Reflecting,
            Phase::Reflecting => Phase::ResearchingCritique,
            Phase::ResearchingCritique => Phase::Generating,
            Phase::Terminated => Phase::Terminated,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminated)
    }
}

/// Progress emitted while a run executes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A node finished and its merged state was checkpointed
    Node {
        node: String,
        phase: Phase,
        update: StateUpdate,
    },
    /// The graph reached its terminal phase
    Finished {
        thread_id: String,
        state: WorkflowState,
    },
    Error {
        message: String,
    },
}

impl RunEvent {
    /// `{node: update}` mapping for node events
    pub fn update_map(&self) -> Option<Value> {
        match self {
            RunEvent::Node { node, update, .. } => Some(json!({ node.as_str(): update })),
            _ => None,
        }
    }
}

/// Executes the drafting graph for one thread at a time per call
pub struct DraftGraph {
    steps: StepContext,
    checkpointer: Arc<dyn Checkpointer>,
}

impl DraftGraph {
    pub fn new(steps: StepContext, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            steps,
            checkpointer,
        }
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run to completion and return the final state
    pub async fn run(
        &self,
        key: &CheckpointKey,
        initial: WorkflowState,
    ) -> Result<WorkflowState, DrafterError> {
        self.execute(key, initial, None).await
    }

    /// Run to completion, sending a [`RunEvent`] after every node
    ///
    /// A closed receiver does not stop the run.
    pub async fn run_stream(
        &self,
        key: &CheckpointKey,
        initial: WorkflowState,
        tx: mpsc::Sender<RunEvent>,
    ) -> Result<WorkflowState, DrafterError> {
        self.execute(key, initial, Some(&tx)).await
    }

    /// Last checkpointed state for `key`
    pub async fn get_state(
        &self,
        key: &CheckpointKey,
    ) -> Result<Option<WorkflowState>, DrafterError> {
        match self.checkpointer.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn execute(
        &self,
        key: &CheckpointKey,
        initial: WorkflowState,
        tx: Option<&mpsc::Sender<RunEvent>>,
    ) -> Result<WorkflowState, DrafterError> {
        if initial.task.trim().is_empty() {
            return Err(DrafterError::InvalidInput(
                "task must not be empty".to_string(),
            ));
        }

        let thread_id = key.record_id();
        let recursion_limit = key.recursion_limit();
        let mut state = initial;
        let mut phase = Phase::INITIAL;
        let mut executed: u32 = 0;

        log::info!(
            "Run '{}' starting at revision {} of {}",
            thread_id,
            state.revision_number,
            state.max_revisions
        );

        while let Some(node) = phase.node() {
            if let Some(limit) = recursion_limit {
                if executed >= limit {
                    log::error!("Run '{}' hit recursion limit {}", thread_id, limit);
                    return Err(DrafterError::RecursionLimit { limit });
                }
            }
            executed += 1;

            log::info!("Run '{}': executing node {}", thread_id, node);
            let update = self.execute_node(phase, &state).await?;

            state.apply(&update);
            self.checkpointer.put(key, &state.snapshot()).await?;
            log::info!(
                "Node {} completed (revision {}, {} content items)",
                node,
                state.revision_number,
                state.content.len()
            );

            if let Some(tx) = tx {
                let _ = tx
                    .send(RunEvent::Node {
                        node: node.to_string(),
                        phase,
                        update,
                    })
                    .await;
            }

            phase = phase.next(&state);
        }

        log::info!(
            "Run '{}' finished after {} nodes at revision {}",
            thread_id,
            executed,
            state.revision_number
        );

        if let Some(tx) = tx {
            let _ = tx
                .send(RunEvent::Finished {
                    thread_id,
                    state: state.clone(),
                })
                .await;
        }

        Ok(state)
    }

    async fn execute_node(
        &self,
        phase: Phase,
        state: &WorkflowState,
    ) -> Result<StateUpdate, DrafterError> {
        match phase {
            Phase::Planning => steps::plan(&self.steps, state).await,
            Phase::ResearchingPlan => steps::research_plan(&self.steps, state).await,
            Phase::Generating => steps::generate(&self.steps, state).await,
            Phase::Reflecting => steps::reflect(&self.steps, state).await,
            Phase::ResearchingCritique => steps::research_critique(&self.steps, state).await,
            Phase::Terminated => Ok(StateUpdate::default()),
        }
    }
}
