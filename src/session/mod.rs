//! 会话注册表
//!
//! 进程内、不持久化的短期会话：创建时生成 ID，追加消息，显式销毁或按空闲时长显式清理。
//! 所有修改都在写锁内完成，同一会话的并发修改因此被串行化。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// 会话 ID
pub type SessionId = String;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// 单个会话
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub agent_id: String,
    pub messages: Vec<SessionMessage>,
    /// 自由格式的上下文
    pub context: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            agent_id: agent_id.into(),
            messages: Vec::new(),
            context: HashMap::new(),
            created_at: now,
            last_active: now,
        }
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// 空闲是否超过 timeout
    pub fn is_idle(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_active)
            .to_std()
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }
}

/// 会话注册表（可廉价克隆的句柄）
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 agent 创建会话并返回 ID
    pub async fn create(&self, agent_id: &str) -> SessionId {
        let session = Session::new(agent_id);
        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session);
        tracing::debug!("Session {} created for agent {}", id, agent_id);
        id
    }

    /// 追加消息；会话不存在时不做任何事，返回 false
    pub async fn append_message(&self, session_id: &str, role: Role, content: impl Into<String>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.messages.push(SessionMessage {
                    role,
                    content: content.into(),
                    timestamp: Utc::now(),
                });
                session.touch();
                true
            }
            None => false,
        }
    }

    /// 会话快照
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// 销毁会话，返回是否存在
    pub async fn destroy(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            tracing::debug!("Session {} destroyed", session_id);
        }
        removed
    }

    /// 写入上下文键值；会话不存在时返回 false
    pub async fn set_context(&self, session_id: &str, key: impl Into<String>, value: Value) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.context.insert(key.into(), value);
                session.touch();
                true
            }
            None => false,
        }
    }

    /// 最近 limit 条消息（None 表示全部）
    pub async fn history(&self, session_id: &str, limit: Option<usize>) -> Vec<SessionMessage> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(session_id) else {
            return Vec::new();
        };
        let messages = &session.messages;
        let start = limit.map_or(0, |l| messages.len().saturating_sub(l));
        messages[start..].to_vec()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// 清理空闲超过 max_idle 的会话，返回清理数量（只在调用时发生，不会自动回收）
    pub async fn cleanup_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(max_idle, now));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!("Cleaned up {} idle session(s)", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_append_get() {
        let registry = SessionRegistry::new();
        let id = registry.create("networking_coach").await;
        assert!(id.starts_with("session_"));

        assert!(registry.append_message(&id, Role::User, "Who should I follow up with?").await);
        assert!(registry.append_message(&id, Role::Assistant, "Start with Ada.").await);

        let session = registry.get(&id).await.unwrap();
        assert_eq!(session.agent_id, "networking_coach");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[1].content, "Start with Ada.");
    }

    #[tokio::test]
    async fn test_append_to_missing_session_is_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.append_message("session_missing", Role::User, "hi").await);
        assert!(registry.get("session_missing").await.is_none());
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_destroy() {
        let registry = SessionRegistry::new();
        let id = registry.create("a").await;
        assert!(registry.destroy(&id).await);
        assert!(!registry.destroy(&id).await);
        assert!(registry.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_unique() {
        let registry = SessionRegistry::new();
        let a = registry.create("a").await;
        let b = registry.create("a").await;
        assert_ne!(a, b);
        assert_eq!(registry.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_context_and_history_limit() {
        let registry = SessionRegistry::new();
        let id = registry.create("a").await;
        assert!(registry.set_context(&id, "contact_id", serde_json::json!("c_42")).await);
        for i in 0..5 {
            registry.append_message(&id, Role::User, format!("m{i}")).await;
        }

        let last_two = registry.history(&id, Some(2)).await;
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].content, "m3");
        assert_eq!(registry.history(&id, None).await.len(), 5);
        assert_eq!(registry.get(&id).await.unwrap().context["contact_id"], "c_42");
    }

    #[tokio::test]
    async fn test_cleanup_idle() {
        let registry = SessionRegistry::new();
        let id = registry.create("a").await;
        assert_eq!(registry.cleanup_idle(Duration::from_secs(3600)).await, 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(registry.cleanup_idle(Duration::ZERO).await, 1);
        assert!(registry.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialized() {
        let registry = SessionRegistry::new();
        let id = registry.create("a").await;
        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = registry.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                registry.append_message(&id, Role::User, format!("m{i}")).await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
        assert_eq!(registry.history(&id, None).await.len(), 20);
    }
}
