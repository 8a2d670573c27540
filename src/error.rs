use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("参数校验失败: {0}")]
    Validation(String),
    #[error("{0}不存在")]
    NotFound(String),
    #[error("权限不足: {0}")]
    Permission(String),
    #[error("资源冲突: {0}")]
    Conflict(String),
    #[error("未授权访问")]
    Unauthorized,
    #[error("请求过于频繁，请在{retry_after_secs}秒后重试")]
    RateLimited { retry_after_secs: u64 },
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("缓存错误: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("外部服务错误: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Permission(_) => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::Conflict(_) => (StatusCode::CONFLICT, error_codes::CONFLICT),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, error_codes::RATE_LIMIT),
            AppError::Database(_) | AppError::Cache(_) | AppError::Upstream(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 内部错误只记录日志，不向客户端暴露细节
        let msg = if status.is_server_error() {
            tracing::error!("Internal error: {}", self);
            "内部服务器错误".to_string()
        } else {
            self.to_string()
        };

        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status() {
        let cases = [
            (AppError::validation("x"), StatusCode::BAD_REQUEST),
            (AppError::not_found("群组"), StatusCode::NOT_FOUND),
            (AppError::permission("x"), StatusCode::FORBIDDEN),
            (AppError::conflict("x"), StatusCode::CONFLICT),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::Upstream("influx".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
