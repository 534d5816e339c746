//! HTTP 接口层
//!
//! 每个资源一个子模块，各自提供 `routes()`；这里负责共享状态、
//! 中间件（CORS / 请求体上限 / 访问日志）以及路由装配。

mod ai;
mod auth;
mod chat;
mod dashboard;
mod extract;
mod flashcards;
mod notes;
mod pomodoro;
mod quizzes;
mod reports;
mod study_plan;
mod subjects;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::warn;

use crate::config::{AppConfig, AuthConfig};
use crate::database::StudyDatabase;
use crate::llm::TextGenerator;
use crate::notifications::NotificationHub;
use crate::response::ApiResponse;
use crate::services::{AiService, AuthService, Mailer, QuizService, ReportService};

pub use extract::{ApiJson, AuthUser, OptionalJson};

/// 请求体上限
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<StudyDatabase>,
    pub auth: Arc<AuthService>,
    pub ai: Arc<AiService>,
    pub quizzes: Arc<QuizService>,
    pub reports: Arc<ReportService>,
    pub notifications: Arc<NotificationHub>,
}

impl AppState {
    pub fn new(
        db: Arc<StudyDatabase>,
        generator: Arc<dyn TextGenerator>,
        mailer: Arc<dyn Mailer>,
        auth_config: AuthConfig,
    ) -> Self {
        let notifications = Arc::new(NotificationHub::new());
        Self {
            auth: Arc::new(AuthService::new(db.clone(), mailer, auth_config)),
            ai: Arc::new(AiService::new(
                db.clone(),
                generator,
                notifications.clone(),
            )),
            quizzes: Arc::new(QuizService::new(db.clone())),
            reports: Arc::new(ReportService::new(db.clone())),
            notifications,
            db,
        }
    }
}

/// 配置了来源时只放行该来源，否则放开
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = config
        .server
        .cors_origin
        .as_deref()
        .and_then(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("[HTTP] Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        });

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
            .max_age(Duration::from_secs(60 * 60)),
        None => CorsLayer::permissive(),
    }
}

async fn health() -> ApiResponse<()> {
    ApiResponse::message("OK")
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::routes())
        .nest("/notes", notes::routes())
        .nest("/flashcards", flashcards::routes())
        .nest("/quizzes", quizzes::routes())
        .nest("/subjects", subjects::routes())
        .nest("/pomodoro", pomodoro::routes())
        .nest("/ai", ai::routes())
        .nest("/chat", chat::routes())
        .nest("/study-plan", study_plan::routes())
        .nest("/reports", reports::routes())
        .nest("/dashboard", dashboard::routes())
        .route("/ws", get(ws::upgrade))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
