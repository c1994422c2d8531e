//! 基于实体后端的轨迹存储：每条轨迹写为一条 AgentTrace 记录

use std::sync::Arc;

use async_trait::async_trait;

use super::{TraceRecord, TraceStore};
use crate::backend::{EntityBackend, TRACE_ENTITY};
use crate::core::StoreError;

pub struct BackendTraceStore {
    backend: Arc<dyn EntityBackend>,
}

impl BackendTraceStore {
    pub fn new(backend: Arc<dyn EntityBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TraceStore for BackendTraceStore {
    async fn append(&self, record: &TraceRecord) -> Result<(), StoreError> {
        let fields = serde_json::to_value(record)?;
        self.backend.create(TRACE_ENTITY, fields).await?;
        Ok(())
    }

    /// 无法解析的记录被跳过
    async fn list(&self) -> Result<Vec<TraceRecord>, StoreError> {
        Ok(self
            .backend
            .list(TRACE_ENTITY)
            .await?
            .into_iter()
            .filter_map(|r| match serde_json::from_value::<TraceRecord>(r.fields) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed trace record {}: {}", r.id, e);
                    None
                }
            })
            .collect())
    }
}
