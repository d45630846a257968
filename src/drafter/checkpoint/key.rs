// SPDX-License-Identifier: MIT

//! Checkpoint keys and record id derivation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Execution context passed alongside a run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Named callback handlers attached to the run
    #[serde(default)]
    pub callbacks: Vec<String>,
    /// Upper bound on node executions for the run
    #[serde(default)]
    pub recursion_limit: Option<u32>,
    #[serde(default)]
    pub configurable: Configurable,
}

/// Routing fields nested inside a [`RunConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Configurable {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub checkpoint_ns: String,
}

impl RunConfig {
    /// Config scoped to a thread id
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            configurable: Configurable {
                thread_id: Some(thread_id.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Key a checkpoint is stored under
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointKey {
    /// Plain run identifier
    Thread(String),
    /// Structured execution context with a nested thread id
    Context(RunConfig),
}

impl CheckpointKey {
    /// Single string record id for the backend
    ///
    /// The nested thread id wins when present; otherwise the key is
    /// stringified as-is.
    pub fn record_id(&self) -> String {
        match self {
            Self::Thread(id) => id.clone(),
            Self::Context(config) => match &config.configurable.thread_id {
                Some(thread_id) => thread_id.clone(),
                None => serde_json::to_string(config).unwrap_or_else(|_| format!("{:?}", config)),
            },
        }
    }

    /// Recursion limit carried by a structured key
    pub fn recursion_limit(&self) -> Option<u32> {
        match self {
            Self::Thread(_) => None,
            Self::Context(config) => config.recursion_limit,
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.record_id())
    }
}

impl From<&str> for CheckpointKey {
    fn from(s: &str) -> Self {
        Self::Thread(s.to_string())
    }
}

impl From<String> for CheckpointKey {
    fn from(s: String) -> Self {
        Self::Thread(s)
    }
}

impl From<RunConfig> for CheckpointKey {
    fn from(config: RunConfig) -> Self {
        Self::Context(config)
    }
}
