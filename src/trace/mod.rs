//! 执行轨迹：每次任务调用恰好产生一条 TraceRecord，只追加不修改

pub mod backend;
pub mod jsonl;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ExecutionStep, StepKind, StoreError};

pub use backend::BackendTraceStore;
pub use jsonl::JsonlTraceStore;

/// 任务最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Success,
    /// 主操作失败、降级操作成功
    Partial,
    Failed,
}

/// 一次任务调用的终态记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub run_id: String,
    pub agent: String,
    pub task: String,
    pub status: TraceStatus,
    pub steps: Vec<ExecutionStep>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TraceRecord {
    /// 某类步骤出现的次数
    pub fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind == kind).count()
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }
}

/// 轨迹存储接口
#[async_trait]
pub trait TraceStore: Send + Sync {
    async fn append(&self, record: &TraceRecord) -> Result<(), StoreError>;

    /// 按写入顺序返回全部记录
    async fn list(&self) -> Result<Vec<TraceRecord>, StoreError>;
}

/// 进程内轨迹存储
#[derive(Clone, Default)]
pub struct InMemoryTraceStore {
    records: Arc<RwLock<Vec<TraceRecord>>>,
}

impl InMemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 按任务名查找
    pub fn by_task(&self, task: &str) -> Vec<TraceRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.task == task)
            .collect()
    }
}

#[async_trait]
impl TraceStore for InMemoryTraceStore {
    async fn append(&self, record: &TraceRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TraceRecord>, StoreError> {
        Ok(self.records())
    }
}
