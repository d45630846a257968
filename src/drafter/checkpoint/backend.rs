// SPDX-License-Identifier: MIT

//! Key-value persistence backends for checkpoints

use crate::drafter::error::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Remote upsert-by-id / select-by-id interface
///
/// Implementations classify every failure as transient or fatal; the store
/// decides whether to retry from that classification alone.
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// Insert or overwrite the payload stored under `id`
    async fn upsert(&self, id: &str, payload: &Value) -> Result<(), BackendError>;

    /// Latest payload stored under `id`, `None` when absent
    async fn select(&self, id: &str) -> Result<Option<Value>, BackendError>;
}

/// Process-local backend, last writer wins per id
#[derive(Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointBackend for MemoryBackend {
    async fn upsert(&self, id: &str, payload: &Value) -> Result<(), BackendError> {
        let mut records = self.records.write().await;
        records.insert(id.to_string(), payload.clone());
        Ok(())
    }

    async fn select(&self, id: &str) -> Result<Option<Value>, BackendError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }
}
