use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Router,
};
use serde::Serialize;

use super::{AppState, AuthUser};
use crate::error::AppResult;
use crate::models::ChatMessage;
use crate::repos::chat_repo::ChatDeleteOutcome;
use crate::repos::ChatRepo;
use crate::response::ApiResponse;

#[derive(Debug, Serialize)]
struct ChatHistory {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearedChat {
    deleted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedMessage {
    id: String,
    /// false 表示仅替换为占位文本，再删一次才会物理删除
    removed: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", delete(clear_chat))
        .route("/history", get(chat_history))
        .route("/:id", delete(delete_message))
}

async fn chat_history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiResponse<ChatHistory>> {
    let messages = ChatRepo::history(&state.db, auth.id())?;
    Ok(ApiResponse::ok("Chat history fetched", ChatHistory { messages }))
}

async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeletedMessage>> {
    let outcome = ChatRepo::delete(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok(
        "Message deleted",
        DeletedMessage {
            id,
            removed: outcome == ChatDeleteOutcome::Removed,
        },
    ))
}

async fn clear_chat(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiResponse<ClearedChat>> {
    let deleted_count = ChatRepo::clear(&state.db, auth.id())?;
    Ok(ApiResponse::ok(
        "Chat cleared successfully",
        ClearedChat { deleted_count },
    ))
}
