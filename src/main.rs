//! Hive - 演示入口
//!
//! 加载配置、初始化日志，并发执行三个示例任务（抖动后恢复、降级挽救、鉴权失败），
//! 最后把每条执行轨迹以 JSON 行输出到 stdout。

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use hive::{
    core::{create_hive_builder, operation, TaskError, TaskInvocation},
    observability,
    session::Role,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 配置加载失败时使用默认值，build 时记录警告
    let builder = create_hive_builder(std::env::args().nth(1).map(PathBuf::from));
    observability::init(&builder.config().logging);

    let hive = builder.build();

    let session_id = hive.sessions.create("demo_coordinator").await;
    hive.sessions
        .append_message(&session_id, Role::User, "Enrich today's new contacts")
        .await;

    // 第一次超时，第二次成功
    let flaky_calls = Arc::new(AtomicU32::new(0));
    let flaky = {
        let calls = flaky_calls.clone();
        TaskInvocation::new(
            "enricher",
            "fetch_profile",
            operation(move |ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if ctx.attempt < 2 {
                        Err(TaskError::from_message("upstream timeout"))
                    } else {
                        Ok(format!("profile fetched on attempt {}", ctx.attempt))
                    }
                }
            }),
        )
    };

    // 主操作始终失败，由缓存降级挽救
    let rescued = TaskInvocation::new(
        "enricher",
        "enrich_contact",
        operation(|_| async { Err(TaskError::from_message("500 server error")) }),
    )
    .with_max_attempts(2)
    .with_fallback(
        "cached-lookup",
        operation(|ctx| async move {
            Ok(format!("cached result ({} prior insight(s))", ctx.memories.len()))
        }),
    );

    // 鉴权失败：不重试，不降级
    let unauthorized = TaskInvocation::new(
        "mailer",
        "sync_inbox",
        operation(|_| async { Err(TaskError::from_message("403 Forbidden")) }),
    )
    .with_fallback("never-used", operation(|_| async { Ok("unreachable".to_string()) }));

    let outcomes = hive
        .orchestrator
        .execute_all(vec![flaky, rescued, unauthorized])
        .await;

    for outcome in &outcomes {
        match outcome {
            Ok(value) => tracing::info!("Task result: {}", value),
            Err(e) => tracing::warn!("Task error: {}", e),
        }
    }
    tracing::info!("Flaky operation invoked {} time(s)", flaky_calls.load(Ordering::SeqCst));

    hive.sessions
        .append_message(
            &session_id,
            Role::Assistant,
            format!("{} of {} task(s) succeeded", outcomes.iter().filter(|o| o.is_ok()).count(), outcomes.len()),
        )
        .await;
    hive.sessions.destroy(&session_id).await;

    let traces = hive.traces.list().await.context("Failed to list traces")?;
    for record in traces {
        println!("{}", serde_json::to_string(&record).context("Failed to encode trace")?);
    }

    Ok(())
}
