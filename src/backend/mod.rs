//! 托管后端（BaaS）实体接口
//!
//! 内核只依赖三个原语：按实体类型 create / list / update。过滤在调用方完成，后端不做查询。
//! InMemoryBackend 供测试与本地运行使用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::StoreError;

/// 执行轨迹实体类型
pub const TRACE_ENTITY: &str = "AgentTrace";
/// 学习记忆实体类型
pub const MEMORY_ENTITY: &str = "AgentMemory";

/// 后端返回的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub kind: String,
    pub fields: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 实体后端接口
#[async_trait]
pub trait EntityBackend: Send + Sync {
    async fn create(&self, kind: &str, fields: Value) -> Result<Record, StoreError>;

    /// 列出某类型的全部记录（按创建顺序）
    async fn list(&self, kind: &str) -> Result<Vec<Record>, StoreError>;

    /// 浅合并更新：fields 为对象时逐键覆盖，否则整体替换
    async fn update(&self, kind: &str, id: &str, fields: Value) -> Result<Record, StoreError>;
}

/// 进程内实体后端
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    records: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, kind: &str) -> usize {
        self.records.read().await.get(kind).map_or(0, Vec::len)
    }
}

#[async_trait]
impl EntityBackend for InMemoryBackend {
    async fn create(&self, kind: &str, fields: Value) -> Result<Record, StoreError> {
        let now = Utc::now();
        let record = Record {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            fields,
            created_at: now,
            updated_at: now,
        };
        self.records
            .write()
            .await
            .entry(kind.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn list(&self, kind: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn update(&self, kind: &str, id: &str, fields: Value) -> Result<Record, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(kind)
            .and_then(|rs| rs.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;

        match (&mut record.fields, fields) {
            (Value::Object(existing), Value::Object(patch)) => {
                for (k, v) in patch {
                    existing.insert(k, v);
                }
            }
            (slot, replacement) => *slot = replacement,
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
