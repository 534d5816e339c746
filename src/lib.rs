// Study Assistant library entry
// 提供 run() 供 bin 目标调用；集成测试直接使用 http::router。

pub mod config;
pub mod database;
pub mod error;
pub mod http;
pub mod llm;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod repos;
pub mod response;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::StudyDatabase;
use crate::http::AppState;
use crate::llm::ChatCompletionClient;
use crate::services::{LogMailer, Mailer, SmtpMailer};

fn build_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp)?)),
        None => {
            warn!("[Startup] SMTP not configured, emails will only be logged");
            Ok(Arc::new(LogMailer::new()))
        }
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let db = Arc::new(StudyDatabase::new(db_path)?);
    info!(
        "[Startup] Database ready at {} (schema v{})",
        db.db_path().display(),
        db.get_schema_version()?
    );

    if config.llm.api_key.is_none() {
        warn!("[Startup] No text generation API key configured, AI routes will fail");
    }
    let generator = Arc::new(ChatCompletionClient::new(config.llm.clone())?);
    let mailer = build_mailer(&config)?;

    let state = AppState::new(db, generator, mailer, config.auth.clone());
    let app = http::router(state, http::cors_layer(&config));

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("[Startup] Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[Startup] Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("[Startup] Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("[Startup] Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("[Startup] Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("[Startup] Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
