//! 执行过程事件：步骤类型、进度事件与观察者
//!
//! 每次任务调用内的步骤严格有序；观察者只做旁路通知，不影响控制流。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 步骤类型（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// 检索历史经验
    Memory,
    /// 主操作的一次尝试
    Execution,
    Success,
    Error,
    /// 失败分析（致命错误、取消）
    Analysis,
    /// 启用降级操作
    Refinement,
    /// 退避等待
    Wait,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepKind::Memory => "memory",
            StepKind::Execution => "execution",
            StepKind::Success => "success",
            StepKind::Error => "error",
            StepKind::Analysis => "analysis",
            StepKind::Refinement => "refinement",
            StepKind::Wait => "wait",
        };
        f.write_str(s)
    }
}

/// 轨迹中的单个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub timestamp: DateTime<Utc>,
    pub kind: StepKind,
    pub message: String,
}

impl ExecutionStep {
    pub fn new(kind: StepKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        }
    }
}

/// 推送给观察者的进度状态：error 步骤为 Failed，其余为 Working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Working,
    Failed,
}

impl From<StepKind> for ProgressStatus {
    fn from(kind: StepKind) -> Self {
        match kind {
            StepKind::Error => ProgressStatus::Failed,
            _ => ProgressStatus::Working,
        }
    }
}

/// 单步进度事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub agent: String,
    pub task: String,
    pub kind: StepKind,
    pub message: String,
    pub status: ProgressStatus,
}

/// 进度观察者
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// 通过 mpsc 通道转发事件；接收端关闭后事件被丢弃
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: StepKind) -> ProgressEvent {
        ProgressEvent {
            run_id: "run_1".to_string(),
            agent: "enricher".to_string(),
            task: "enrich_contact".to_string(),
            kind,
            message: "msg".to_string(),
            status: kind.into(),
        }
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(ProgressStatus::from(StepKind::Error), ProgressStatus::Failed);
        assert_eq!(ProgressStatus::from(StepKind::Wait), ProgressStatus::Working);
        assert_eq!(ProgressStatus::from(StepKind::Success), ProgressStatus::Working);
    }

    #[test]
    fn test_step_kind_serializes_snake_case() {
        let json = serde_json::to_string(&StepKind::Refinement).unwrap();
        assert_eq!(json, "\"refinement\"");
        assert_eq!(StepKind::Wait.to_string(), "wait");
    }

    #[tokio::test]
    async fn test_channel_observer_preserves_order() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_progress(&event(StepKind::Memory));
        observer.on_progress(&event(StepKind::Execution));
        observer.on_progress(&event(StepKind::Error));

        assert_eq!(rx.recv().await.unwrap().kind, StepKind::Memory);
        assert_eq!(rx.recv().await.unwrap().kind, StepKind::Execution);
        let last = rx.recv().await.unwrap();
        assert_eq!(last.kind, StepKind::Error);
        assert_eq!(last.status, ProgressStatus::Failed);
    }

    #[test]
    fn test_closure_observer() {
        let seen = std::sync::Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| seen.lock().unwrap().push(e.kind);
        observer.on_progress(&event(StepKind::Wait));
        assert_eq!(*seen.lock().unwrap(), vec![StepKind::Wait]);
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_progress(&event(StepKind::Success));
    }
}
