use axum::{extract::State, routing::get, Router};
use serde::Serialize;

use super::{AppState, AuthUser};
use crate::error::AppResult;
use crate::models::StudyPlan;
use crate::repos::StudyPlanRepo;
use crate::response::ApiResponse;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedPlan {
    /// 计划正文；没有计划时为 null
    plan: Option<String>,
    study_plan: Option<StudyPlan>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_plan).delete(clear_plan))
}

async fn get_plan(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<SavedPlan>> {
    let response = match StudyPlanRepo::find(&state.db, auth.id())? {
        Some(plan) => ApiResponse::ok(
            "Study plan fetched",
            SavedPlan {
                plan: Some(plan.plan_text.clone()),
                study_plan: Some(plan),
            },
        ),
        None => ApiResponse::ok(
            "No study plan found",
            SavedPlan {
                plan: None,
                study_plan: None,
            },
        ),
    };
    Ok(response)
}

async fn clear_plan(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<()>> {
    StudyPlanRepo::delete(&state.db, auth.id())?;
    Ok(ApiResponse::message("Study plan cleared"))
}
