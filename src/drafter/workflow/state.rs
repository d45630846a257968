// SPDX-License-Identifier: MIT

//! Workflow state threaded through every node, and the partial updates
//! nodes return

use crate::drafter::checkpoint::Raw;
use crate::drafter::search::Source;
use serde::{Deserialize, Serialize};

/// The record every node reads and the engine checkpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    /// Topic; fixed for the whole run
    pub task: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub draft: String,
    #[serde(default)]
    pub critique: String,
    /// Retrieved snippets, append-only, in retrieval order
    #[serde(default)]
    pub content: Vec<String>,
    /// Retrieved documents, append-only
    #[serde(default)]
    pub sources: Vec<Source>,
    pub revision_number: u32,
    pub max_revisions: u32,
}

impl WorkflowState {
    /// Fresh state starting at revision 1
    pub fn new(task: impl Into<String>, max_revisions: u32) -> Self {
        Self {
            task: task.into(),
            revision_number: 1,
            max_revisions,
            ..Default::default()
        }
    }

    pub fn with_revision_number(mut self, revision_number: u32) -> Self {
        self.revision_number = revision_number;
        self
    }

    /// True once the revision budget is spent
    pub fn revisions_exhausted(&self) -> bool {
        self.revision_number > self.max_revisions
    }

    /// Merge a node's update into the state
    ///
    /// Scalar fields overwrite; `content` and `sources` extend.
    pub fn apply(&mut self, update: &StateUpdate) {
        if let Some(plan) = &update.plan {
            self.plan = plan.clone();
        }
        if let Some(draft) = &update.draft {
            self.draft = draft.clone();
        }
        if let Some(critique) = &update.critique {
            self.critique = critique.clone();
        }
        if let Some(revision_number) = update.revision_number {
            self.revision_number = revision_number;
        }
        self.content.extend(update.content.iter().cloned());
        self.sources.extend(update.sources.iter().cloned());
    }

    /// Snapshot handed to the checkpoint store
    pub fn snapshot(&self) -> Raw {
        Raw::capture(self)
    }
}

/// Fields a node changed
///
/// `content` and `sources` hold only the items the node retrieved; the
/// engine appends them to what the state already has.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_number: Option<u32>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        self == &StateUpdate::default()
    }
}
