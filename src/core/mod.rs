//! 核心执行层：错误分类、恢复策略、步骤事件、任务调用、韧性执行器与并行编排

pub mod builder;
pub mod error;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod recovery;
pub mod task;

pub use builder::{create_hive_builder, HiveBuilder, HiveComponents};
pub use error::{StoreError, TaskError, AUTH_MARKERS};
pub use events::{
    ChannelObserver, ExecutionStep, ProgressEvent, ProgressObserver, ProgressStatus, StepKind,
};
pub use executor::ResilientExecutor;
pub use orchestrator::ParallelOrchestrator;
pub use recovery::{BackoffStrategy, RecoveryAction, RecoveryEngine};
pub use task::{operation, AttemptContext, Fallback, Operation, TaskInvocation, DEFAULT_MAX_ATTEMPTS};
