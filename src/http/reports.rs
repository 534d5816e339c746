use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use serde_json::json;

use super::{AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{Report, ReportType};
use crate::notifications::{event_types, Notification};
use crate::response::ApiResponse;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/weekly", get(weekly_report))
        .route("/monthly", get(monthly_report))
        .route("/:id", get(get_report).delete(delete_report))
}

fn generate(state: &AppState, user_id: &str, kind: ReportType) -> AppResult<Report> {
    let report = state.reports.generate(user_id, kind)?;
    state.notifications.send_to_user(
        user_id,
        &Notification::new(
            event_types::REPORT_READY,
            "Report ready",
            format!("Your {} report has been generated", kind.as_str()),
        )
        .with_data(json!({ "reportId": report.id })),
    );
    Ok(report)
}

async fn weekly_report(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<Report>> {
    let report = generate(&state, auth.id(), ReportType::Weekly)?;
    Ok(ApiResponse::ok("Weekly report generated successfully", report))
}

async fn monthly_report(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<Report>> {
    let report = generate(&state, auth.id(), ReportType::Monthly)?;
    Ok(ApiResponse::ok("Monthly report generated successfully", report))
}

async fn get_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Report>> {
    let report = state.reports.find(auth.id(), &id)?;
    Ok(ApiResponse::ok("Report fetched successfully", report))
}

async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.reports.delete(auth.id(), &id)?;
    Ok(ApiResponse::message("Report deleted successfully"))
}
