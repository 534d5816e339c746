//! 统一错误类型
//!
//! 所有服务与仓储层都返回 `AppResult<T>`，HTTP 层通过 `IntoResponse`
//! 将错误映射为状态码与 `{ success: false, message, data: null }` 信封。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::ApiResponse;

/// 结果类型别名
pub type AppResult<T> = Result<T, AppError>;

/// 应用错误
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入缺失或非法
    #[error("{0}")]
    Validation(String),

    /// 未登录 / 令牌无效 / 凭证错误
    #[error("{0}")]
    Unauthorized(String),

    /// 已认证但不允许（例如账号已删除）
    #[error("{0}")]
    Forbidden(String),

    /// 资源不存在（含已软删除、或不属于当前用户）
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// 资源冲突
    #[error("{0}")]
    Conflict(String),

    /// 生成结果中没有可用的结构化记录
    #[error("{0}")]
    NoUsableOutput(String),

    /// 上游服务（文本生成 / 邮件）失败
    #[error("{0}")]
    Upstream(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(String),

    /// 其他内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn no_usable_output(message: impl Into<String>) -> Self {
        Self::NoUsableOutput(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoUsableOutput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Database(format!("Connection pool error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("[HTTP] {} - {}", status, self);
        }
        let body: ApiResponse<()> = ApiResponse::failure(self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("Note", "n_1").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::forbidden("ACCOUNT_DELETED").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::upstream("rate limited").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::no_usable_output("none").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::database("locked").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::not_found("Quiz", "q_abc");
        assert_eq!(err.to_string(), "Quiz not found: q_abc");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, AppError::Database(_)));
    }
}
