use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict(message.into())
    }

    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Unauthorized => "unauthorized",
            StoreError::Forbidden(_) => "forbidden",
            StoreError::Validation(_) => "validation_failed",
            StoreError::Conflict(_) => "conflict",
            StoreError::InvalidTransition { .. } => "invalid_transition",
            StoreError::RateLimited { .. } => "rate_limited",
            StoreError::PayloadTooLarge { .. } => "payload_too_large",
            StoreError::UnsupportedMedia(_) => "unsupported_media_type",
            StoreError::Database(_)
            | StoreError::Io(_)
            | StoreError::Json(_)
            | StoreError::Http(_)
            | StoreError::Config(_)
            | StoreError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Conflict(_) | StoreError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            StoreError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            StoreError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "Something went wrong on our side".to_string()
        } else {
            self.to_string()
        };

        let mut response = (
            status,
            Json(json!({ "error": self.code(), "message": message })),
        )
            .into_response();

        if let StoreError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
