//! 任务调用：主操作、重试策略、降级操作与进度观察者
//!
//! 构造后不可变，由消费它的那次 execute 独占。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::core::{BackoffStrategy, ProgressObserver, TaskError};
use crate::memory::MemoryEntry;

/// 默认最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 每次尝试的输入：尝试序号（从 1 开始）与执行前检索到的经验
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub attempt: u32,
    pub memories: Arc<[MemoryEntry]>,
}

/// 延迟执行、可能失败的操作
pub type Operation<T> = Arc<dyn Fn(AttemptContext) -> BoxFuture<'static, Result<T, TaskError>> + Send + Sync>;

/// 将异步闭包包装为 Operation
pub fn operation<T, F, Fut>(f: F) -> Operation<T>
where
    F: Fn(AttemptContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// 具名降级操作
pub struct Fallback<T> {
    pub name: String,
    pub operation: Operation<T>,
}

/// 一次任务调用
pub struct TaskInvocation<T> {
    pub agent: String,
    pub task: String,
    pub operation: Operation<T>,
    pub backoff: BackoffStrategy,
    /// 0 表示使用执行器配置的默认值
    pub max_attempts: u32,
    pub fallbacks: Vec<Fallback<T>>,
    pub observer: Option<Arc<dyn ProgressObserver>>,
    pub cancel_token: Option<CancellationToken>,
}

impl<T> TaskInvocation<T> {
    pub fn new(agent: impl Into<String>, task: impl Into<String>, operation: Operation<T>) -> Self {
        Self {
            agent: agent.into(),
            task: task.into(),
            operation,
            backoff: BackoffStrategy::Exponential,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fallbacks: Vec::new(),
            observer: None,
            cancel_token: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// 追加降级操作（按追加顺序尝试）
    pub fn with_fallback(mut self, name: impl Into<String>, operation: Operation<T>) -> Self {
        self.fallbacks.push(Fallback {
            name: name.into(),
            operation,
        });
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 退避等待期间可被取消
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

impl<T> fmt::Debug for TaskInvocation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInvocation")
            .field("agent", &self.agent)
            .field("task", &self.task)
            .field("backoff", &self.backoff)
            .field("max_attempts", &self.max_attempts)
            .field(
                "fallbacks",
                &self.fallbacks.iter().map(|fb| fb.name.as_str()).collect::<Vec<_>>(),
            )
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operation_receives_context() {
        let op = operation(|ctx: AttemptContext| async move {
            Ok::<_, TaskError>(format!("attempt {} with {} memories", ctx.attempt, ctx.memories.len()))
        });
        let out = op(AttemptContext {
            attempt: 2,
            memories: Arc::from(Vec::new()),
        })
        .await
        .unwrap();
        assert_eq!(out, "attempt 2 with 0 memories");
    }

    #[test]
    fn test_builder_defaults_and_debug() {
        let inv = TaskInvocation::new(
            "enricher",
            "enrich_contact",
            operation(|_| async { Ok::<u8, TaskError>(1) }),
        )
        .with_fallback("cached-lookup", operation(|_| async { Ok(2) }));

        assert_eq!(inv.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(inv.backoff, BackoffStrategy::Exponential);
        assert_eq!(inv.fallbacks.len(), 1);
        let dbg = format!("{inv:?}");
        assert!(dbg.contains("cached-lookup"));
    }
}
