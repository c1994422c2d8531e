//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__EXECUTOR__BACKOFF_UNIT_MS=10`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub trace: TraceSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// [executor] 段：重试、退避与学习记忆参数
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// 调用方传入 0 次尝试时采用的默认值
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    /// 退避公式中「一秒」对应的毫秒数（测试或本地调试可调小）
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    /// 执行前检索、降级成功后写入的记忆分类
    #[serde(default = "default_memory_category")]
    pub memory_category: String,
    /// 降级成功写入记忆时的置信度
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f32,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_memory_category() -> String {
    "system_learning".to_string()
}

fn default_fallback_confidence() -> f32 {
    0.8
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            default_max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            memory_category: default_memory_category(),
            fallback_confidence: default_fallback_confidence(),
        }
    }
}

/// [orchestrator] 段：并行执行上限（0 表示不限制）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrchestratorSection {
    #[serde(default)]
    pub max_concurrency: usize,
}

/// [trace] 段：执行轨迹落盘路径；未设置时只保存在内存
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TraceSection {
    pub path: Option<PathBuf>,
}

/// [memory] 段
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    /// 内存记忆库最多保留的条目数，超出时丢弃最旧的
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    1000
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// [session] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// 显式调用 cleanup_idle 时使用的空闲阈值（秒）
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    3600
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// [logging] 段：RUST_LOG 未设置时的日志级别
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
