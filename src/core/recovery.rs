//! 错误恢复引擎
//!
//! 根据 TaskError 与当前尝试次数返回 RecoveryAction，供执行器决定是终止、退避重试、启用降级还是放弃。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::TaskError;

/// 重试间隔策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// 第 n 次失败后等待 2^n 个单位
    #[default]
    Exponential,
    /// 固定等待 1 个单位
    Linear,
}

impl BackoffStrategy {
    /// 第 `attempt` 次失败后的等待时长
    pub fn delay(&self, attempt: u32, unit: Duration) -> Duration {
        match self {
            Self::Exponential => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                unit.saturating_mul(factor)
            }
            Self::Linear => unit,
        }
    }
}

/// 恢复引擎根据错误类型与进度给出的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 致命错误：立即终止，不重试也不降级
    Abort,
    /// 等待后进行下一次尝试
    RetryAfter(Duration),
    /// 主操作重试耗尽，依次尝试降级操作
    EngageFallbacks,
    /// 重试耗尽且没有降级操作
    GiveUp,
}

/// 失败分类与升级策略
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    backoff_unit: Duration,
}

impl RecoveryEngine {
    pub fn new(backoff_unit: Duration) -> Self {
        Self { backoff_unit }
    }

    /// 第 `attempt` 次（从 1 开始）主操作失败后的处理动作
    pub fn handle(
        &self,
        err: &TaskError,
        attempt: u32,
        max_attempts: u32,
        strategy: BackoffStrategy,
        has_fallbacks: bool,
    ) -> RecoveryAction {
        if err.is_fatal() {
            return RecoveryAction::Abort;
        }
        if attempt < max_attempts {
            return RecoveryAction::RetryAfter(strategy.delay(attempt, self.backoff_unit));
        }
        if has_fallbacks {
            RecoveryAction::EngageFallbacks
        } else {
            RecoveryAction::GiveUp
        }
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
