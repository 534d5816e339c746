//! 通知推送通道
//!
//! 每个连接一个转发任务，把 `NotificationHub` 投递到通道里的帧写回客户端；
//! 读循环只处理 `register-user`（令牌校验通过才登记），其余文本帧记 debug 日志后忽略。

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::AppState;
use crate::notifications::{ClientEvent, NotificationHub};
use crate::services::AuthService;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.notifications.clone();
    let auth = state.auth.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, auth))
}

fn error_frame(message: &str) -> String {
    serde_json::json!({ "event": "error", "message": message }).to_string()
}

async fn handle_socket(socket: WebSocket, hub: Arc<NotificationHub>, auth: Arc<AuthService>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = hub.connect(tx.clone());

    let forward = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::RegisterUser { user_id, token }) => {
                    match auth.authorize_subscription(&user_id, &token) {
                        Ok(()) => hub.register_user(&user_id, &conn_id),
                        Err(e) => {
                            warn!("[WebSocket] Rejected registration on {}: {}", conn_id, e);
                            let _ = tx.send(error_frame(&e.to_string()));
                        }
                    }
                }
                Err(e) => debug!("[WebSocket] Ignoring frame on {}: {}", conn_id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("[WebSocket] Connection {} errored: {}", conn_id, e);
                break;
            }
        }
    }

    hub.disconnect(&conn_id);
    forward.abort();
}
