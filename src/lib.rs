//! Hive - 多智能体任务的韧性执行层
//!
//! 模块划分：
//! - **backend**: 实体后端协作者接口（create / list / update）与内存实现
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、恢复策略、步骤事件、韧性执行器、并行编排与组件构建
//! - **memory**: 经验记忆库与相关性打分
//! - **observability**: tracing 订阅器初始化
//! - **session**: 进程内短期会话注册表
//! - **trace**: 执行轨迹记录与存储（内存 / JSONL / 实体后端）

pub mod backend;
pub mod config;
pub mod core;
pub mod memory;
pub mod observability;
pub mod session;
pub mod trace;

pub use crate::core::{
    operation, AttemptContext, BackoffStrategy, HiveBuilder, HiveComponents, ParallelOrchestrator,
    ResilientExecutor, TaskError, TaskInvocation,
};
