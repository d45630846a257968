// SPDX-License-Identifier: MIT

//! Run configuration - YAML file loading and parsing
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Secrets never live here; clients read them from the
//! environment.

use crate::adk::model::GenerationConfig;
use crate::drafter::checkpoint::{RetryPolicy, DEFAULT_MAX_DEPTH, DEFAULT_TABLE};
use crate::drafter::error::DrafterError;
use crate::drafter::search::SearchDepth;
use crate::drafter::workflow::prompts::CONTENT_PLACEHOLDER;
use crate::drafter::workflow::{Prompts, StepSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Nesting of a state snapshot: state object, `sources` array, source object
pub const MIN_CHECKPOINT_DEPTH: usize = 3;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DrafterConfig {
    pub model: ModelSettings,
    pub search: SearchSettings,
    pub checkpoint: CheckpointSettings,
    /// Caps the research context sent to the writer
    pub max_context_chars: Option<usize>,
    pub prompts: Prompts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub name: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Per-request HTTP timeout for every client
    pub timeout_secs: Option<u64>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "gpt-3.5-turbo".to_string(),
            temperature: Some(0.0),
            max_output_tokens: None,
            timeout_secs: Some(120),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    #[default]
    Tavily,
    Brave,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    pub provider: SearchProviderKind,
    /// Results requested per query
    pub max_results: u32,
    pub depth: SearchDepth,
    /// Queries used per research step
    pub max_queries: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::Tavily,
            max_results: 2,
            depth: SearchDepth::Basic,
            max_queries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckpointSettings {
    pub backend: BackendKind,
    pub table: String,
    /// Nesting limit for payload normalization
    pub max_depth: usize,
    pub retry: RetryPolicy,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Supabase,
            table: DEFAULT_TABLE.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            retry: RetryPolicy::default(),
        }
    }
}

impl DrafterConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DrafterError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, DrafterError> {
        // An empty document deserializes as unit, not as an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: DrafterConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DrafterError> {
        if self.checkpoint.retry.max_attempts == 0 {
            return Err(DrafterError::config(
                "checkpoint.retry.max_attempts must be at least 1",
            ));
        }
        if self.search.max_queries == 0 {
            return Err(DrafterError::config("search.max_queries must be at least 1"));
        }
        if self.model.name.trim().is_empty() {
            return Err(DrafterError::config("model.name must not be empty"));
        }
        if self.checkpoint.max_depth < MIN_CHECKPOINT_DEPTH {
            return Err(DrafterError::config(format!(
                "checkpoint.max_depth must be at least {}",
                MIN_CHECKPOINT_DEPTH
            )));
        }
        if !self.prompts.writer.contains(CONTENT_PLACEHOLDER) {
            return Err(DrafterError::config(format!(
                "prompts.writer must contain the {} placeholder",
                CONTENT_PLACEHOLDER
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.model.timeout_secs.map(Duration::from_secs)
    }

    /// Settings handed to the node functions
    pub fn step_settings(&self) -> StepSettings {
        StepSettings {
            prompts: self.prompts.clone(),
            generation: GenerationConfig {
                temperature: self.model.temperature,
                max_output_tokens: self.model.max_output_tokens,
                ..Default::default()
            },
            max_queries: self.search.max_queries,
            results_per_query: self.search.max_results,
            search_depth: self.search.depth,
            max_context_chars: self.max_context_chars,
            ..StepSettings::default()
        }
    }
}
