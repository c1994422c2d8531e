//! 基于实体后端的记忆库：写入为 AgentMemory 记录，检索时列出全部再在本地过滤

use std::sync::Arc;

use async_trait::async_trait;

use super::relevance::{RelevanceScorer, SubstringRelevance};
use super::store::{filter_relevant, MemoryEntry, MemoryStore};
use crate::backend::{EntityBackend, MEMORY_ENTITY};
use crate::core::StoreError;

pub struct BackendMemoryStore {
    backend: Arc<dyn EntityBackend>,
    scorer: Arc<dyn RelevanceScorer>,
}

impl BackendMemoryStore {
    pub fn new(backend: Arc<dyn EntityBackend>) -> Self {
        Self {
            backend,
            scorer: Arc::new(SubstringRelevance),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }
}

#[async_trait]
impl MemoryStore for BackendMemoryStore {
    async fn query(&self, category: &str, key_fragment: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let records = self.backend.list(MEMORY_ENTITY).await?;
        let entries = records.into_iter().filter_map(|r| {
            serde_json::from_value::<MemoryEntry>(r.fields)
                .map_err(|e| tracing::debug!("Skipping malformed memory record {}: {}", r.id, e))
                .ok()
        });
        Ok(filter_relevant(entries, category, key_fragment, self.scorer.as_ref()))
    }

    async fn insert(&self, entry: MemoryEntry) -> Result<(), StoreError> {
        let fields = serde_json::to_value(&entry)?;
        self.backend.create(MEMORY_ENTITY, fields).await?;
        Ok(())
    }
}
