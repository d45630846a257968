// SPDX-License-Identifier: MIT

//! Typed error handling for the drafting workflow
//!
//! Steps perform no local recovery: every collaborator and persistence failure
//! converts into [`DrafterError`] and bubbles to the caller of the graph.

use crate::adk::error::ModelError;
use thiserror::Error;

/// Top-level error type for a drafting run
#[derive(Debug, Error)]
pub enum DrafterError {
    /// Language model failures, propagated unchanged
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Search collaborator failures, propagated unchanged
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Checkpoint could not be written or read
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Structured query generation returned something unusable
    #[error(transparent)]
    MalformedOutput(#[from] MalformedStructuredOutput),

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller-supplied initial state is unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// More node executions than the run's recursion limit allows
    #[error("Recursion limit of {limit} node executions reached")]
    RecursionLimit { limit: u32 },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl DrafterError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Search collaborator errors
#[derive(Debug, Error)]
pub enum SearchError {
    /// API key not configured
    #[error("API key not configured for search provider: {0}")]
    ApiKeyMissing(String),

    /// Non-success response from the provider
    #[error("Search API error from {provider} ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Response did not have the expected shape
    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

/// Failure reported by a checkpoint backend for a single attempt
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Network-layer fault expected to clear on retry
    #[error("transient backend fault: {0}")]
    Transient(String),

    /// Anything a retry will not fix
    #[error("backend rejected request: {0}")]
    Fatal(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A checkpoint operation failed for good
#[derive(Debug, Error)]
#[error("Failed to {operation} checkpoint '{key}' after {attempts} attempt(s): {source}")]
pub struct PersistenceError {
    /// Record id the operation targeted
    pub key: String,
    /// `upsert` or `select`
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub source: BackendError,
}

/// Structured query output could not be parsed against its schema
#[derive(Debug, Error)]
#[error("Malformed structured output ({reason}): {raw}")]
pub struct MalformedStructuredOutput {
    pub reason: String,
    /// Leading slice of the offending model output
    pub raw: String,
}

impl MalformedStructuredOutput {
    const PREVIEW_CHARS: usize = 200;

    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.chars().take(Self::PREVIEW_CHARS).collect(),
        }
    }
}
