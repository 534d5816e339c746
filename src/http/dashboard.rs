use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::info;

use super::{AppState, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::ReportType;
use crate::response::ApiResponse;
use crate::services::pdf_report::{render_report_pdf, report_filename};
use crate::services::report_service::Dashboard;

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl ReportQuery {
    /// 缺省为周报；只接受 weekly / monthly
    fn report_type(&self) -> AppResult<ReportType> {
        let raw = self.kind.as_deref().map(str::trim).unwrap_or("weekly");
        match ReportType::from_str(raw) {
            Some(kind @ (ReportType::Weekly | ReportType::Monthly)) => Ok(kind),
            _ => Err(AppError::validation(format!("Unknown report type: {}", raw))),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/report", get(download_report))
}

async fn dashboard(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<Dashboard>> {
    let dashboard = state.reports.dashboard(auth.id())?;
    Ok(ApiResponse::ok("Dashboard data", dashboard))
}

async fn download_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let kind = query.report_type()?;
    let snapshot = state.reports.build_for(auth.id(), kind)?;
    let bytes = tokio::task::spawn_blocking(move || render_report_pdf(&snapshot, kind))
        .await
        .map_err(|e| AppError::internal(format!("PDF task failed: {}", e)))??;

    info!(
        "[Dashboard] Rendered {} report PDF ({} bytes) for user {}",
        kind.as_str(),
        bytes.len(),
        auth.id()
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", report_filename(kind)),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_query_type() {
        assert_eq!(ReportQuery::default().report_type().unwrap(), ReportType::Weekly);
        let monthly = ReportQuery {
            kind: Some("monthly".into()),
        };
        assert_eq!(monthly.report_type().unwrap(), ReportType::Monthly);
        let custom = ReportQuery {
            kind: Some("custom".into()),
        };
        assert!(matches!(custom.report_type(), Err(AppError::Validation(_))));
    }
}
