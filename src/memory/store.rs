//! 学习记忆：按分类 + 键存取的经验条目
//!
//! 执行前按 (category, 任务名) 检索，降级成功后写入。条目只增不改，检索按写入顺序返回。

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::relevance::{RelevanceScorer, SubstringRelevance};
use crate::core::StoreError;

/// 一条学到的经验
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub category: String,
    /// 通常是任务名
    pub key: String,
    pub value: String,
    pub source_agent: String,
    /// [0, 1]
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        source_agent: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            id: format!("mem_{}", uuid::Uuid::new_v4()),
            category: category.into(),
            key: key.into(),
            value: value.into(),
            source_agent: source_agent.into(),
            confidence: if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) },
            created_at: Utc::now(),
        }
    }
}

/// 记忆库接口
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 返回分类相同且键与 key_fragment 相关的条目
    async fn query(&self, category: &str, key_fragment: &str) -> Result<Vec<MemoryEntry>, StoreError>;

    async fn insert(&self, entry: MemoryEntry) -> Result<(), StoreError>;
}

/// 在客户端做分类 + 相关性过滤（保持输入顺序）
pub fn filter_relevant(
    entries: impl IntoIterator<Item = MemoryEntry>,
    category: &str,
    key_fragment: &str,
    scorer: &dyn RelevanceScorer,
) -> Vec<MemoryEntry> {
    entries
        .into_iter()
        .filter(|e| e.category == category && scorer.is_relevant(&e.key, key_fragment))
        .collect()
}

/// 进程内记忆库：超出 max_entries 时丢弃最旧的条目
#[derive(Clone)]
pub struct InMemoryMemoryStore {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    scorer: Arc<dyn RelevanceScorer>,
    max_entries: usize,
}

impl InMemoryMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            scorer: Arc::new(SubstringRelevance),
            max_entries: max_entries.max(1),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// 当前全部条目的快照
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn query(&self, category: &str, key_fragment: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let snapshot = self.entries();
        Ok(filter_relevant(
            snapshot,
            category,
            key_fragment,
            self.scorer.as_ref(),
        ))
    }

    async fn insert(&self, entry: MemoryEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
        let n = entries.len();
        if n > self.max_entries {
            entries.drain(0..n - self.max_entries);
        }
        Ok(())
    }
}
