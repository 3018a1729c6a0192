use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A record-store error.
    #[error("Record store error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A malformed or incomplete request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A missing or wrong admin credential.
    #[error("Authorization failed")]
    Unauthorized,

    /// The presented download token does not exist in the store.
    #[error("Token inválido")]
    InvalidToken,

    /// The presented download token has passed its expiry.
    #[error("Token expirado")]
    TokenExpired,

    /// The presented download token was already redeemed.
    #[error("Token já usado")]
    TokenAlreadyUsed,

    /// The payment processor or the file host answered with a failure.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// An unexpected failure anywhere in the pipeline.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Redis(ref e) => {
                tracing::error!("Record store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::UNAUTHORIZED, "unauthorized".to_string())
            }

            AppError::InvalidToken => {
                tracing::warn!("Rejected download: unknown token");
                (StatusCode::UNAUTHORIZED, "Token inválido".to_string())
            }

            AppError::TokenExpired => {
                tracing::warn!("Rejected download: expired token");
                (StatusCode::UNAUTHORIZED, "Token expirado".to_string())
            }

            AppError::TokenAlreadyUsed => {
                tracing::warn!("Rejected download: token already used");
                (StatusCode::UNAUTHORIZED, "Token já usado".to_string())
            }

            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
