// SPDX-License-Identifier: MIT

//! Assembles collaborators, checkpoint store and graph from a config

use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::Model;
use crate::drafter::checkpoint::{
    CheckpointBackend, CheckpointStore, Checkpointer, MemoryBackend, Normalizer, SupabaseBackend,
};
use crate::drafter::config::{BackendKind, DrafterConfig, SearchProviderKind, MIN_CHECKPOINT_DEPTH};
use crate::drafter::error::DrafterError;
use crate::drafter::search::{BraveSearch, SearchProvider, TavilySearch};
use crate::drafter::workflow::{DraftGraph, StepContext};
use std::sync::Arc;

pub struct Builder {
    config: DrafterConfig,
}

impl Builder {
    pub fn new(config: DrafterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DrafterConfig {
        &self.config
    }

    pub fn build_model(&self) -> Result<Arc<dyn Model>, DrafterError> {
        log::info!("Using model: {}", self.config.model.name);
        let model = OpenAIModel::new(self.config.model.name.clone(), self.config.timeout())?;
        Ok(Arc::new(model))
    }

    pub fn build_search(&self) -> Result<Arc<dyn SearchProvider>, DrafterError> {
        let timeout = self.config.timeout();
        let search: Arc<dyn SearchProvider> = match self.config.search.provider {
            SearchProviderKind::Tavily => Arc::new(TavilySearch::new(timeout)?),
            SearchProviderKind::Brave => Arc::new(BraveSearch::new(timeout)?),
        };
        log::info!("Using search provider: {}", search.name());
        Ok(search)
    }

    pub fn build_backend(&self) -> Result<Arc<dyn CheckpointBackend>, DrafterError> {
        match self.config.checkpoint.backend {
            BackendKind::Memory => {
                log::warn!("Using in-memory checkpoints; state is lost on exit");
                Ok(Arc::new(MemoryBackend::new()))
            }
            BackendKind::Supabase => {
                let backend =
                    SupabaseBackend::from_env(&self.config.checkpoint.table, self.config.timeout())
                        .map_err(|e| DrafterError::config(e.to_string()))?;
                log::info!(
                    "Using Supabase checkpoints in table '{}'",
                    self.config.checkpoint.table
                );
                Ok(Arc::new(backend))
            }
        }
    }

    /// Store over an explicit backend, with the configured retry and depth
    ///
    /// Depths too shallow to hold a state snapshot are raised to the minimum.
    pub fn store_with(&self, backend: Arc<dyn CheckpointBackend>) -> CheckpointStore {
        let mut max_depth = self.config.checkpoint.max_depth;
        if max_depth < MIN_CHECKPOINT_DEPTH {
            log::warn!(
                "checkpoint.max_depth {} cannot hold a state snapshot, using {}",
                max_depth,
                MIN_CHECKPOINT_DEPTH
            );
            max_depth = MIN_CHECKPOINT_DEPTH;
        }
        CheckpointStore::new(backend)
            .with_retry(self.config.checkpoint.retry.clone())
            .with_normalizer(Normalizer::new(max_depth))
    }

    pub fn build_store(&self) -> Result<CheckpointStore, DrafterError> {
        Ok(self.store_with(self.build_backend()?))
    }

    /// Graph over explicit collaborators
    pub fn graph_with(
        &self,
        model: Arc<dyn Model>,
        search: Arc<dyn SearchProvider>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> DraftGraph {
        let steps = StepContext::new(model, search).with_settings(self.config.step_settings());
        DraftGraph::new(steps, checkpointer)
    }

    pub fn build_graph(&self) -> Result<DraftGraph, DrafterError> {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(self.build_store()?);
        Ok(self.graph_with(self.build_model()?, self.build_search()?, checkpointer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafter::checkpoint::{CheckpointKey, Raw, DEPTH_MARKER};
    use crate::drafter::search::Source;
    use crate::drafter::workflow::WorkflowState;
    use serde_json::json;

    fn memory_config() -> DrafterConfig {
        let mut config = DrafterConfig::default();
        config.checkpoint.backend = BackendKind::Memory;
        config
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let store = Builder::new(memory_config()).build_store().unwrap();
        let key = CheckpointKey::from("t");
        store.put(&key, &Raw::from("x")).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(json!("x")));
    }

    #[tokio::test]
    async fn test_store_uses_configured_depth_and_retry() {
        let mut config = memory_config();
        config.checkpoint.max_depth = 3;
        config.checkpoint.retry.max_attempts = 7;
        let store = Builder::new(config).store_with(Arc::new(MemoryBackend::new()));

        assert_eq!(store.retry_policy().max_attempts, 7);
        let nested = Raw::Seq(vec![Raw::Seq(vec![Raw::Seq(vec![Raw::Seq(vec![])])])]);
        let written = store.put(&CheckpointKey::from("t"), &nested).await.unwrap();
        assert_eq!(written, json!([[[DEPTH_MARKER]]]));
    }

    #[tokio::test]
    async fn test_shallow_depth_still_stores_readable_snapshots() {
        let mut config = memory_config();
        config.checkpoint.max_depth = 1;
        let store = Builder::new(config).store_with(Arc::new(MemoryBackend::new()));

        let mut state = WorkflowState::new("Rust", 1);
        state.content.push("snippet".to_string());
        state.sources.push(Source {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            content: "snippet".to_string(),
        });
        let key = CheckpointKey::from("t");
        store.put(&key, &state.snapshot()).await.unwrap();

        let read = store.get(&key).await.unwrap().unwrap();
        let restored: WorkflowState = serde_json::from_value(read).unwrap();
        assert_eq!(restored, state);
    }
}
