//! 实时通知
//!
//! 维护两张表：
//! - 用户 ID → 连接 ID（客户端发送 `register-user` 后写入）
//! - 连接 ID → 该连接的发送通道
//!
//! 同一用户重复注册时后注册的连接生效；连接断开时按值扫描移除用户映射。
//! 推送给未注册的用户是静默的空操作。

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::database::now_timestamp;

/// 通知类型常量
pub mod event_types {
    pub const FLASHCARDS_GENERATED: &str = "flashcards-generated";
    pub const QUIZ_GENERATED: &str = "quiz-generated";
    pub const NOTES_GENERATED: &str = "notes-generated";
    pub const STUDY_PLAN_READY: &str = "study-plan-ready";
    pub const REPORT_READY: &str = "report-ready";
}

/// 服务端推送的事件名
pub const NOTIFICATION_EVENT: &str = "notification";

/// 推送给客户端的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub created_at: String,
}

impl Notification {
    pub fn new(kind: &str, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.into(),
            message: message.into(),
            data: None,
            created_at: now_timestamp(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// WebSocket 帧内容：`{"event":"notification", ...}`
    pub fn to_frame(&self) -> String {
        let mut frame = serde_json::json!({ "event": NOTIFICATION_EVENT });
        if let (Some(obj), Ok(Value::Object(fields))) =
            (frame.as_object_mut(), serde_json::to_value(self))
        {
            obj.extend(fields);
        }
        frame.to_string()
    }
}

/// 客户端发来的消息
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// 订阅某个用户的通知，需携带该用户的登录令牌
    #[serde(rename_all = "camelCase")]
    RegisterUser {
        user_id: String,
        #[serde(default)]
        token: String,
    },
}

pub type FrameSender = mpsc::UnboundedSender<String>;

/// 通知中心，启动时创建并通过 `AppState` 共享
#[derive(Default)]
pub struct NotificationHub {
    user_connections: DashMap<String, String>,
    connections: DashMap<String, FrameSender>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新连接建立，返回连接 ID
    pub fn connect(&self, sender: FrameSender) -> String {
        let conn_id = nanoid::nanoid!(12);
        self.connections.insert(conn_id.clone(), sender);
        debug!("[Notifications] Client connected: {}", conn_id);
        conn_id
    }

    /// 把用户绑定到连接
    pub fn register_user(&self, user_id: &str, conn_id: &str) {
        self.user_connections
            .insert(user_id.to_string(), conn_id.to_string());
        info!(
            "[Notifications] User {} registered with connection {}",
            user_id, conn_id
        );
    }

    /// 连接断开：移除通道以及指向它的用户映射
    pub fn disconnect(&self, conn_id: &str) {
        self.connections.remove(conn_id);
        self.user_connections.retain(|_, bound| bound != conn_id);
        debug!("[Notifications] Client disconnected: {}", conn_id);
    }

    pub fn connection_for(&self, user_id: &str) -> Option<String> {
        self.user_connections.get(user_id).map(|c| c.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// 推送给单个用户；用户未注册或连接已关闭时返回 false
    pub fn send_to_user(&self, user_id: &str, notification: &Notification) -> bool {
        let Some(conn_id) = self.connection_for(user_id) else {
            debug!(
                "[Notifications] No connection for user {}, dropping {}",
                user_id, notification.kind
            );
            return false;
        };
        let delivered = self
            .connections
            .get(&conn_id)
            .map(|sender| sender.send(notification.to_frame()).is_ok())
            .unwrap_or(false);
        if !delivered {
            debug!("[Notifications] Connection {} is gone", conn_id);
        }
        delivered
    }

    /// 推送给所有连接，返回送达数
    pub fn broadcast(&self, notification: &Notification) -> usize {
        let frame = notification.to_frame();
        self.connections
            .iter()
            .filter(|entry| entry.value().send(frame.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_disconnect_by_value() {
        let hub = NotificationHub::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let conn_a = hub.connect(tx_a);
        let conn_b = hub.connect(tx_b);

        hub.register_user("user_1", &conn_a);
        hub.register_user("user_2", &conn_b);
        assert_eq!(hub.connection_for("user_1").as_deref(), Some(conn_a.as_str()));

        hub.disconnect(&conn_a);
        assert!(hub.connection_for("user_1").is_none());
        assert_eq!(hub.connection_for("user_2").as_deref(), Some(conn_b.as_str()));
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_send_to_registered_user_only() {
        let hub = NotificationHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = hub.connect(tx);
        hub.register_user("user_1", &conn);

        let note = Notification::new(event_types::QUIZ_GENERATED, "Quiz ready", "5 questions");
        assert!(hub.send_to_user("user_1", &note));
        assert!(!hub.send_to_user("user_2", &note));

        let frame: Value = serde_json::from_str(&rx.try_recv().expect("frame")).unwrap();
        assert_eq!(frame["event"], "notification");
        assert_eq!(frame["type"], "quiz-generated");
        assert_eq!(frame["message"], "5 questions");
    }

    #[test]
    fn test_reregister_moves_user_to_latest_connection() {
        let hub = NotificationHub::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let conn_a = hub.connect(tx_a);
        let conn_b = hub.connect(tx_b);
        hub.register_user("user_1", &conn_a);
        hub.register_user("user_1", &conn_b);

        // 旧连接断开不影响新绑定
        hub.disconnect(&conn_a);
        assert!(hub.send_to_user("user_1", &Notification::new("x", "t", "m")));
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_counts_live_connections() {
        let hub = NotificationHub::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        hub.connect(tx_a);
        hub.connect(tx_b);
        drop(rx_b);
        assert_eq!(hub.broadcast(&Notification::new("x", "t", "m")), 1);
    }

    #[test]
    fn test_client_event_parsing() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"register-user","userId":"user_1","token":"abc"}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::RegisterUser {
                user_id: "user_1".to_string(),
                token: "abc".to_string()
            }
        );
    }
}
