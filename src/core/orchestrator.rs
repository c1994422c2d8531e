//! 并行编排：对多个任务调用并发执行，收齐全部结果后按输入顺序返回
//!
//! 单个任务失败只体现在它自己的结果槽位，不会中断整批；操作内的 panic 由执行器转换为普通失败。

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::core::{ResilientExecutor, TaskError, TaskInvocation};

/// 并行编排器
#[derive(Clone)]
pub struct ParallelOrchestrator {
    executor: Arc<ResilientExecutor>,
    /// None 表示不限制并发
    limit: Option<Arc<Semaphore>>,
}

impl ParallelOrchestrator {
    pub fn new(executor: Arc<ResilientExecutor>) -> Self {
        Self {
            executor,
            limit: None,
        }
    }

    /// 同时运行的任务上限；0 表示不限制
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.limit = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn executor(&self) -> &Arc<ResilientExecutor> {
        &self.executor
    }

    /// 每个调用在独立的 tokio 任务中执行；返回与输入等长、同序的结果
    pub async fn execute_all<T: Send + 'static>(
        &self,
        invocations: Vec<TaskInvocation<T>>,
    ) -> Vec<Result<T, TaskError>> {
        let total = invocations.len();
        tracing::info!("Dispatching {} task(s)", total);

        let handles: Vec<_> = invocations
            .into_iter()
            .map(|invocation| {
                let executor = Arc::clone(&self.executor);
                let limit = self.limit.clone();
                tokio::spawn(async move {
                    let _permit = match limit {
                        Some(sem) => match sem.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(_) => return Err(TaskError::Aborted("concurrency limiter closed".to_string())),
                        },
                        None => None,
                    };
                    executor.execute(invocation).await
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        for handle in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::warn!("Task join failed: {}", join_err);
                    Err(TaskError::Aborted(join_err.to_string()))
                }
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        tracing::info!("Batch settled: {} succeeded, {} failed", total - failed, failed);
        outcomes
    }
}
