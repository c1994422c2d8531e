//! 任务错误与存储错误
//!
//! TaskError 是操作边界上的类型化错误：鉴权失败（致命）与瞬时失败（可重试）在构造时就区分开，
//! 执行器只看变体，不再嗅探错误文本。只能返回字符串的协作方可用 `TaskError::from_message` 兼容旧的标记规则。

use thiserror::Error;

/// 旧协作方错误文本中表示 HTTP 401/403 的标记（大小写不敏感）
pub const AUTH_MARKERS: &[&str] = &["401", "403", "unauthorized", "forbidden"];

/// 操作与执行器层面的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// 鉴权/授权失败：不重试、不降级，立即上抛
    #[error("{0}")]
    Unauthorized(String),

    /// 瞬时失败（网络、限流、5xx 等）：进入重试循环
    #[error("{0}")]
    Transient(String),

    /// 退避等待期间被取消
    #[error("Task cancelled")]
    Cancelled,

    /// 并行编排中承载任务的 tokio 任务 panic 或被中止
    #[error("Task aborted: {0}")]
    Aborted(String),
}

impl TaskError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// 按错误文本分类：含 401/403 标记的视为鉴权失败，其余视为瞬时失败
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_lowercase();
        if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Unauthorized(msg)
        } else {
            Self::Transient(msg)
        }
    }

    /// 是否为致命错误（跳过重试与降级）
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        Self::from_message(format!("{e:#}"))
    }
}

/// 轨迹 / 记忆 / 实体后端的持久化错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Record not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
