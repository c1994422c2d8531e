//! 组件构建器：按配置组装轨迹存储、记忆库、执行器、编排器与会话注册表

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{ParallelOrchestrator, ResilientExecutor};
use crate::memory::{InMemoryMemoryStore, MemoryStore};
use crate::session::SessionRegistry;
use crate::trace::{InMemoryTraceStore, JsonlTraceStore, TraceStore};

/// 构建器：可替换默认的轨迹存储与记忆库（如接入实体后端）
pub struct HiveBuilder {
    config: AppConfig,
    /// 配置加载失败的原因（此时 config 为默认值），build 时记一条警告
    config_error: Option<String>,
    traces: Option<Arc<dyn TraceStore>>,
    memory: Option<Arc<dyn MemoryStore>>,
}

impl HiveBuilder {
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            config,
            config_error: None,
            traces: None,
            memory: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    pub fn with_trace_store(mut self, traces: Arc<dyn TraceStore>) -> Self {
        self.traces = Some(traces);
        self
    }

    pub fn with_memory_store(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// trace.path 已配置时写 JSONL 文件，否则保存在内存
    fn build_trace_store(&self) -> Arc<dyn TraceStore> {
        match &self.config.trace.path {
            Some(path) => {
                tracing::info!("Using JSONL trace store: {:?}", path);
                Arc::new(JsonlTraceStore::new(path))
            }
            None => {
                tracing::info!("Using in-memory trace store");
                Arc::new(InMemoryTraceStore::new())
            }
        }
    }

    pub fn build(self) -> HiveComponents {
        if let Some(e) = &self.config_error {
            tracing::warn!("Config load failed ({}), using defaults", e);
        }
        let traces = self
            .traces
            .clone()
            .unwrap_or_else(|| self.build_trace_store());
        let memory = self
            .memory
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryMemoryStore::new(self.config.memory.max_entries)));

        let executor = Arc::new(ResilientExecutor::with_config(
            traces.clone(),
            memory.clone(),
            self.config.executor.clone(),
        ));
        let orchestrator = ParallelOrchestrator::new(executor.clone())
            .with_max_concurrency(self.config.orchestrator.max_concurrency);

        HiveComponents {
            executor,
            orchestrator,
            sessions: SessionRegistry::new(),
            traces,
            memory,
            config: self.config,
        }
    }
}

/// 预构建的组件，可在多个调用方之间共享
pub struct HiveComponents {
    pub executor: Arc<ResilientExecutor>,
    pub orchestrator: ParallelOrchestrator,
    pub sessions: SessionRegistry,
    pub traces: Arc<dyn TraceStore>,
    pub memory: Arc<dyn MemoryStore>,
    pub config: AppConfig,
}

impl HiveComponents {
    /// 按配置的空闲阈值清理会话
    pub async fn cleanup_idle_sessions(&self) -> usize {
        self.sessions
            .cleanup_idle(Duration::from_secs(self.config.session.idle_timeout_secs))
            .await
    }
}

/// 便捷函数：加载配置并创建构建器；加载失败时使用默认配置
///
/// 失败原因保留到 build 时再记日志，调用方可以先按返回的配置安装订阅器。
pub fn create_hive_builder(config_path: Option<std::path::PathBuf>) -> HiveBuilder {
    match crate::config::load_config(config_path) {
        Ok(config) => HiveBuilder::from_config(config),
        Err(e) => HiveBuilder {
            config_error: Some(e.to_string()),
            ..HiveBuilder::from_config(AppConfig::default())
        },
    }
}
