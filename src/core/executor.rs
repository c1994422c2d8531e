//! 韧性执行器：重试、失败分类、降级与执行轨迹
//!
//! 流程：
//! 1. 按任务名检索 `system_learning` 经验，附加到每次尝试
//! 2. 主操作最多尝试 max_attempts 次；鉴权失败立即终止，其余失败退避后重试
//! 3. 最后一次仍失败时按顺序尝试降级操作，成功则写入一条经验记忆
//! 4. 任何终态都恰好写一条 TraceRecord；轨迹与记忆的读写失败只记日志，不影响结果

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::ExecutorSection;
use crate::core::{
    AttemptContext, ExecutionStep, Operation, ProgressEvent, ProgressObserver, RecoveryAction,
    RecoveryEngine, StepKind, TaskError, TaskInvocation,
};
use crate::memory::{MemoryEntry, MemoryStore};
use crate::trace::{TraceRecord, TraceStatus, TraceStore};

/// 单次调用内按序累积的步骤，同时转发给观察者
struct StepLog {
    run_id: String,
    agent: String,
    task: String,
    observer: Option<Arc<dyn ProgressObserver>>,
    steps: Vec<ExecutionStep>,
}

impl StepLog {
    fn new(agent: String, task: String, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            run_id: format!("run_{}", uuid::Uuid::new_v4()),
            agent,
            task,
            observer,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, kind: StepKind, message: impl Into<String>) {
        let step = ExecutionStep::new(kind, message);
        match kind {
            StepKind::Error => tracing::warn!(step = %kind, "{}", step.message),
            _ => tracing::debug!(step = %kind, "{}", step.message),
        }
        if let Some(observer) = &self.observer {
            observer.on_progress(&ProgressEvent {
                run_id: self.run_id.clone(),
                agent: self.agent.clone(),
                task: self.task.clone(),
                kind,
                message: step.message.clone(),
                status: kind.into(),
            });
        }
        self.steps.push(step);
    }

    fn into_record(self, status: TraceStatus, error: Option<String>, elapsed: Duration) -> TraceRecord {
        TraceRecord {
            run_id: self.run_id,
            agent: self.agent,
            task: self.task,
            status,
            steps: self.steps,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            error,
            created_at: chrono::Utc::now(),
        }
    }
}

/// 退避等待；返回 false 表示等待期间被取消
async fn backoff_wait(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

/// 运行一次操作；panic 被转换为瞬时失败，照常进入重试与降级
async fn run_guarded<T>(operation: &Operation<T>, ctx: AttemptContext) -> Result<T, TaskError> {
    match AssertUnwindSafe(async move { operation(ctx).await })
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => Err(TaskError::transient(format!(
            "Operation panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// 韧性执行器
pub struct ResilientExecutor {
    traces: Arc<dyn TraceStore>,
    memory: Arc<dyn MemoryStore>,
    recovery: RecoveryEngine,
    config: ExecutorSection,
}

impl ResilientExecutor {
    pub fn new(traces: Arc<dyn TraceStore>, memory: Arc<dyn MemoryStore>) -> Self {
        Self::with_config(traces, memory, ExecutorSection::default())
    }

    pub fn with_config(
        traces: Arc<dyn TraceStore>,
        memory: Arc<dyn MemoryStore>,
        config: ExecutorSection,
    ) -> Self {
        Self {
            traces,
            memory,
            recovery: RecoveryEngine::new(Duration::from_millis(config.backoff_unit_ms)),
            config,
        }
    }

    pub fn traces(&self) -> &Arc<dyn TraceStore> {
        &self.traces
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    /// 执行一次任务调用。只会返回一个错误：致命错误（立即）或最后一次主操作的错误（重试与降级均耗尽后）
    pub async fn execute<T: Send + 'static>(&self, invocation: TaskInvocation<T>) -> Result<T, TaskError> {
        let TaskInvocation {
            agent,
            task,
            operation,
            backoff,
            max_attempts,
            fallbacks,
            observer,
            cancel_token,
        } = invocation;
        let max_attempts = match max_attempts {
            0 => self.config.default_max_attempts.max(1),
            n => n,
        };

        let mut log = StepLog::new(agent, task, observer);
        let span = tracing::info_span!(
            "execute",
            run_id = %log.run_id,
            agent = %log.agent,
            task = %log.task
        );

        async move {
            let started = Instant::now();

            let memories: Arc<[MemoryEntry]> = self.recall(&log.task).await.into();
            log.record(
                StepKind::Memory,
                format!("Recalled {} insight(s) for '{}'", memories.len(), log.task),
            );

            let mut last_error: Option<TaskError> = None;

            for attempt in 1..=max_attempts {
                log.record(StepKind::Execution, format!("Attempt {attempt}/{max_attempts}"));
                let ctx = AttemptContext {
                    attempt,
                    memories: memories.clone(),
                };

                let err = match run_guarded(&operation, ctx).await {
                    Ok(value) => {
                        log.record(StepKind::Success, format!("Succeeded on attempt {attempt}"));
                        self.finish(log, TraceStatus::Success, None, started).await;
                        return Ok(value);
                    }
                    Err(err) => err,
                };
                log.record(StepKind::Error, format!("Attempt {attempt} failed: {err}"));

                let action = self.recovery.handle(
                    &err,
                    attempt,
                    max_attempts,
                    backoff,
                    !fallbacks.is_empty(),
                );
                match action {
                    RecoveryAction::Abort => {
                        log.record(
                            StepKind::Analysis,
                            "Authentication/authorization failure: not retrying, fallbacks skipped",
                        );
                        self.finish(log, TraceStatus::Failed, Some(err.message()), started)
                            .await;
                        return Err(err);
                    }
                    RecoveryAction::RetryAfter(delay) => {
                        log.record(
                            StepKind::Wait,
                            format!(
                                "Waiting {}ms before attempt {}",
                                delay.as_millis(),
                                attempt + 1
                            ),
                        );
                        if !backoff_wait(delay, cancel_token.as_ref()).await {
                            log.record(StepKind::Analysis, "Cancelled during backoff");
                            let cancelled = TaskError::Cancelled;
                            self.finish(log, TraceStatus::Failed, Some(cancelled.message()), started)
                                .await;
                            return Err(cancelled);
                        }
                    }
                    RecoveryAction::EngageFallbacks => {
                        for fallback in &fallbacks {
                            log.record(
                                StepKind::Refinement,
                                format!("Trying fallback '{}'", fallback.name),
                            );
                            let ctx = AttemptContext {
                                attempt: 1,
                                memories: memories.clone(),
                            };
                            match run_guarded(&fallback.operation, ctx).await {
                                Ok(value) => {
                                    log.record(
                                        StepKind::Success,
                                        format!("Fallback '{}' succeeded", fallback.name),
                                    );
                                    self.learn(&log, &fallback.name, max_attempts).await;
                                    self.finish(log, TraceStatus::Partial, Some(err.message()), started)
                                        .await;
                                    return Ok(value);
                                }
                                Err(fb_err) => log.record(
                                    StepKind::Error,
                                    format!("Fallback '{}' failed: {fb_err}", fallback.name),
                                ),
                            }
                        }
                    }
                    RecoveryAction::GiveUp => {}
                }
                last_error = Some(err);
            }

            let err = last_error
                .unwrap_or_else(|| TaskError::transient("no attempt was made"));
            self.finish(log, TraceStatus::Failed, Some(err.message()), started)
                .await;
            Err(err)
        }
        .instrument(span)
        .await
    }

    /// 检索经验；失败时返回空
    async fn recall(&self, task: &str) -> Vec<MemoryEntry> {
        match self.memory.query(&self.config.memory_category, task).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Memory lookup failed, continuing without insights: {}", e);
                Vec::new()
            }
        }
    }

    /// 降级成功后写入经验；写入失败只记日志
    async fn learn(&self, log: &StepLog, fallback: &str, attempts: u32) {
        let entry = MemoryEntry::new(
            self.config.memory_category.clone(),
            log.task.clone(),
            format!(
                "Primary operation for '{}' failed after {} attempt(s); fallback '{}' succeeded",
                log.task, attempts, fallback
            ),
            log.agent.clone(),
            self.config.fallback_confidence,
        );
        if let Err(e) = self.memory.insert(entry).await {
            tracing::warn!("Failed to record fallback insight: {}", e);
        }
    }

    /// 生成并写入终态轨迹；写入失败只记日志
    async fn finish(&self, log: StepLog, status: TraceStatus, error: Option<String>, started: Instant) {
        let record = log.into_record(status, error, started.elapsed());
        match status {
            TraceStatus::Success => tracing::info!(duration_ms = record.duration_ms, "Task succeeded"),
            TraceStatus::Partial => {
                tracing::info!(duration_ms = record.duration_ms, "Task succeeded via fallback")
            }
            TraceStatus::Failed => tracing::info!(
                duration_ms = record.duration_ms,
                error = record.error.as_deref().unwrap_or_default(),
                "Task failed"
            ),
        }
        if let Err(e) = self.traces.append(&record).await {
            tracing::warn!("Failed to persist trace {}: {}", record.run_id, e);
        }
    }
}
