use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use chrono::{NaiveTime, Utc};
use serde::Deserialize;

use super::{ApiJson, AppState, AuthUser};
use crate::database::format_timestamp;
use crate::error::{AppError, AppResult};
use crate::models::{PomodoroSession, PomodoroTodayStats, StartPomodoroParams, UpdatePomodoroParams};
use crate::repos::PomodoroRepo;
use crate::response::{ApiResponse, Created};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndSessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_session))
        .route("/end", post(end_session))
        .route("/stats/today", get(today_stats))
        .route("/history", get(history))
        .route(
            "/:id",
            get(get_session).put(update_session).delete(delete_session),
        )
}

async fn start_session(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<StartPomodoroParams>,
) -> AppResult<Created<PomodoroSession>> {
    let session = PomodoroRepo::start(&state.db, auth.id(), &params)?;
    Ok(Created(ApiResponse::ok("Session started", session)))
}

async fn end_session(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<EndSessionRequest>,
) -> AppResult<ApiResponse<PomodoroSession>> {
    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::validation("sessionId is required"))?;
    let session = PomodoroRepo::end(&state.db, auth.id(), &session_id)?;
    Ok(ApiResponse::ok("Session ended", session))
}

async fn today_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiResponse<PomodoroTodayStats>> {
    let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let stats = PomodoroRepo::stats_since(&state.db, auth.id(), &format_timestamp(&midnight))?;
    Ok(ApiResponse::ok("Today's stats", stats))
}

async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<ApiResponse<Vec<PomodoroSession>>> {
    let sessions = PomodoroRepo::history(&state.db, auth.id())?;
    Ok(ApiResponse::ok("History fetched", sessions))
}

async fn get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PomodoroSession>> {
    let session = PomodoroRepo::find(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::ok("Session fetched", session))
}

async fn update_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(params): ApiJson<UpdatePomodoroParams>,
) -> AppResult<ApiResponse<PomodoroSession>> {
    let session = PomodoroRepo::update(&state.db, auth.id(), &id, &params)?;
    Ok(ApiResponse::ok("Session updated", session))
}

async fn delete_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    PomodoroRepo::soft_delete(&state.db, auth.id(), &id)?;
    Ok(ApiResponse::message("Session deleted"))
}
