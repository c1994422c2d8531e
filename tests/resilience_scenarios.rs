//! 韧性执行集成测试：重试、退避、降级、鉴权中止与并行编排

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use hive::core::{operation, BackoffStrategy, ParallelOrchestrator, ResilientExecutor, StepKind, TaskError, TaskInvocation};
    use hive::memory::{InMemoryMemoryStore, MemoryStore};
    use hive::session::{Role, SessionRegistry};
    use hive::trace::{InMemoryTraceStore, TraceStatus};

    fn setup() -> (Arc<ResilientExecutor>, InMemoryTraceStore, InMemoryMemoryStore) {
        let traces = InMemoryTraceStore::new();
        let memory = InMemoryMemoryStore::default();
        let executor = ResilientExecutor::new(Arc::new(traces.clone()), Arc::new(memory.clone()));
        (Arc::new(executor), traces, memory)
    }

    /// 前 fail_times 次返回 message 对应的错误，之后成功
    fn failing_then_ok(calls: Arc<AtomicU32>, fail_times: u32, message: &'static str) -> hive::core::Operation<String> {
        operation(move |_| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= fail_times {
                    Err(TaskError::from_message(message))
                } else {
                    Ok(format!("ok after {n} call(s)"))
                }
            }
        })
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let (executor, traces, _) = setup();
        let result = executor
            .execute(TaskInvocation::new(
                "enricher",
                "lookup",
                operation(|_| async { Ok::<_, TaskError>(42) }),
            ))
            .await;

        assert_eq!(result, Ok(42));
        let records = traces.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TraceStatus::Success);
        assert_eq!(
            records[0].kinds(),
            vec![StepKind::Memory, StepKind::Execution, StepKind::Success]
        );
        assert!(records[0].error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_then_success() {
        let (executor, traces, _) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let result = executor
            .execute(TaskInvocation::new(
                "enricher",
                "fetch_profile",
                failing_then_ok(calls.clone(), 2, "Timeout"),
            ))
            .await;

        assert_eq!(result.as_deref(), Ok("ok after 3 call(s)"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let record = &traces.records()[0];
        assert_eq!(record.status, TraceStatus::Success);
        let waits: Vec<_> = record
            .steps
            .iter()
            .filter(|s| s.kind == StepKind::Wait)
            .map(|s| s.message.clone())
            .collect();
        assert_eq!(
            waits,
            vec![
                "Waiting 2000ms before attempt 2".to_string(),
                "Waiting 4000ms before attempt 3".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_rescue_records_insight() {
        let (executor, traces, memory) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let result = executor
            .execute(
                TaskInvocation::new(
                    "enricher",
                    "enrich_contact",
                    failing_then_ok(calls.clone(), u32::MAX, "500 server error"),
                )
                .with_max_attempts(2)
                .with_fallback("cached-lookup", operation(|_| async { Ok("cached".to_string()) })),
            )
            .await;

        assert_eq!(result.as_deref(), Ok("cached"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let record = &traces.records()[0];
        assert_eq!(record.status, TraceStatus::Partial);
        assert_eq!(record.error.as_deref(), Some("500 server error"));
        assert_eq!(record.count(StepKind::Refinement), 1);
        assert_eq!(record.count(StepKind::Wait), 1);

        let entries = memory.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "enrich_contact");
        assert_eq!(entries[0].source_agent, "enricher");
        assert!(entries[0].value.contains("cached-lookup"));
        assert!((entries[0].confidence - 0.8).abs() < 1e-6);

        // 下一次同名任务能检索到这条经验
        let recalled = memory.query("system_learning", "enrich_contact").await.unwrap();
        assert_eq!(recalled.len(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_aborts_immediately() {
        let (executor, traces, memory) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));
        let fb = fallback_calls.clone();
        let result = executor
            .execute(
                TaskInvocation::new(
                    "mailer",
                    "sync_inbox",
                    failing_then_ok(calls.clone(), u32::MAX, "403 Forbidden"),
                )
                .with_max_attempts(5)
                .with_fallback(
                    "never",
                    operation(move |_| {
                        fb.fetch_add(1, Ordering::SeqCst);
                        async { Ok("unreachable".to_string()) }
                    }),
                ),
            )
            .await;

        assert_eq!(result, Err(TaskError::Unauthorized("403 Forbidden".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);

        let record = &traces.records()[0];
        assert_eq!(record.status, TraceStatus::Failed);
        assert_eq!(
            record.kinds(),
            vec![StepKind::Memory, StepKind::Execution, StepKind::Error, StepKind::Analysis]
        );
        assert!(memory.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_paths_fail_returns_last_primary_error() {
        let (executor, traces, memory) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let op = {
            let calls = calls.clone();
            operation(move |ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<String, _>(TaskError::from_message(format!("upstream 502 on attempt {}", ctx.attempt))) }
            })
        };
        let result = executor
            .execute(
                TaskInvocation::new("enricher", "enrich_contact", op)
                    .with_max_attempts(2)
                    .with_backoff(BackoffStrategy::Linear)
                    .with_fallback(
                        "cache",
                        operation(|_| async { Err(TaskError::from_message("cache miss")) }),
                    ),
            )
            .await;

        assert_eq!(result, Err(TaskError::Transient("upstream 502 on attempt 2".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let records = traces.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TraceStatus::Failed);
        assert_eq!(records[0].error.as_deref(), Some("upstream 502 on attempt 2"));
        assert!(memory.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_orchestrator_preserves_order_with_mixed_outcomes() {
        let (executor, traces, _) = setup();
        let orchestrator = ParallelOrchestrator::new(executor);

        let outcomes = orchestrator
            .execute_all(vec![
                TaskInvocation::new("a", "one", operation(|_| async { Ok::<_, TaskError>(1) })),
                TaskInvocation::new(
                    "a",
                    "two",
                    operation(|_| async { Err(TaskError::from_message("401 Unauthorized")) }),
                ),
                TaskInvocation::new("a", "three", operation(|_| async { Ok(3) }))
                    .with_max_attempts(1),
            ])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0], Ok(1));
        assert!(matches!(outcomes[1], Err(TaskError::Unauthorized(_))));
        assert_eq!(outcomes[2], Ok(3));
        assert_eq!(traces.records().len(), 3);
        assert_eq!(traces.by_task("two")[0].status, TraceStatus::Failed);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let sessions = SessionRegistry::new();
        let id = sessions.create("networking_coach").await;
        assert!(sessions.append_message(&id, Role::User, "hello").await);
        assert_eq!(sessions.history(&id, None).await.len(), 1);
        assert!(sessions.destroy(&id).await);
        assert!(!sessions.append_message(&id, Role::User, "late").await);
        assert_eq!(sessions.active_count().await, 0);
    }
}
