use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Coarse classification used for logging and for the outward response.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ClientInput,
    Conflict,
    Configuration,
    Dependency,
    RateLimit,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(String),

    #[error("timed out: {0}")]
    Timeout(&'static str),

    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Store(_)
            | AppError::Timeout(_)
            | AppError::Ai(_)
            | AppError::Messaging(_) => ErrorKind::Dependency,
            AppError::InvalidInput(_) => ErrorKind::ClientInput,
            AppError::RateLimited { .. } => ErrorKind::RateLimit,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Dependency
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Ai(_) => StatusCode::BAD_GATEWAY,
            AppError::Messaging(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        };

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "retryable": self.is_retryable(),
        });

        if let AppError::RateLimited { retry_after_seconds } = self {
            body["retry_after_seconds"] = serde_json::json!(retry_after_seconds);
            return (
                status,
                [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                axum::Json(body),
            )
                .into_response();
        }

        (status, axum::Json(body)).into_response()
    }
}
