// SPDX-License-Identifier: MIT

//! Checkpoint store with bounded retry on transient backend faults

use super::backend::CheckpointBackend;
use super::key::CheckpointKey;
use super::normalize::{Normalizer, Raw};
use crate::drafter::error::{BackendError, PersistenceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Exponential backoff settings for backend calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Sleep before the attempt following failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Contract the graph engine persists through
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Normalize `state` and upsert it under `key`; returns what was written
    async fn put(&self, key: &CheckpointKey, state: &Raw) -> Result<Value, PersistenceError>;

    /// Most recent payload for `key`, `None` when nothing was written
    async fn get(&self, key: &CheckpointKey) -> Result<Option<Value>, PersistenceError>;

    /// Version token for the next write; history is not kept
    fn next_version(&self, current: Option<u64>) -> u64;
}

/// Durable key -> state mapping over a [`CheckpointBackend`]
#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
    retry: RetryPolicy,
    normalizer: Normalizer,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn CheckpointBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            normalizer: Normalizer::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out
    async fn retrying<T, F, Fut>(
        &self,
        record_id: &str,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    log::warn!(
                        "Checkpoint {} for '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        record_id,
                        attempt,
                        max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    log::error!(
                        "Checkpoint {} for '{}' failed after {} attempt(s): {}",
                        operation,
                        record_id,
                        attempt,
                        e
                    );
                    return Err(PersistenceError {
                        key: record_id.to_string(),
                        operation,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Checkpointer for CheckpointStore {
    async fn put(&self, key: &CheckpointKey, state: &Raw) -> Result<Value, PersistenceError> {
        let record_id = key.record_id();
        let payload = self.normalizer.normalize(state);

        self.retrying(&record_id, "upsert", || {
            self.backend.upsert(&record_id, &payload)
        })
        .await?;

        log::debug!("Checkpoint written for '{}'", record_id);
        Ok(payload)
    }

    async fn get(&self, key: &CheckpointKey) -> Result<Option<Value>, PersistenceError> {
        let record_id = key.record_id();
        self.retrying(&record_id, "select", || self.backend.select(&record_id))
            .await
    }

    fn next_version(&self, _current: Option<u64>) -> u64 {
        1
    }
}
