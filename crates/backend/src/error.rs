//! HTTP-facing error type.
//!
//! Handlers return [`ApiResult`] and use `?` on service calls; the
//! [`ServiceError`] taxonomy is mapped onto status codes here.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::ServiceError;

/// Error code clients use to prompt calendar re-authorization.
pub const REAUTH_REQUIRED: &str = "reauth_required";

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database connection error")]
    ConnectionPool(#[source] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, invalid or expired session token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The calendar provider no longer accepts the stored token
    #[error("Calendar re-authorization required: {0}")]
    ReauthRequired(String),

    #[error("Calendar provider error: {0}")]
    Provider(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn parts(&self) -> (StatusCode, String, Option<String>) {
        match self {
            ApiError::ConnectionPool(e) => {
                tracing::error!("Connection pool error: {:?}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database connection unavailable".to_string(),
                    None,
                )
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                match e {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        "Resource not found".to_string(),
                        None,
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Database operation failed".to_string(),
                        None,
                    ),
                }
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(e.to_string()),
                )
            }
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                format!("{} not found", resource),
                None,
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            ApiError::ReauthRequired(msg) => {
                tracing::warn!("Calendar re-authorization required: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    REAUTH_REQUIRED.to_string(),
                    Some(msg.clone()),
                )
            }
            ApiError::Provider(msg) => {
                tracing::error!("Calendar provider error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Calendar provider error".to_string(),
                    Some(msg.clone()),
                )
            }
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for ApiError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        ApiError::ConnectionPool(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(resource) => ApiError::NotFound(resource),
            ServiceError::AuthExpired(msg) => ApiError::ReauthRequired(msg),
            ServiceError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Provider(e) => ApiError::Provider(e.to_string()),
            ServiceError::Database(e) => ApiError::Database(e),
            ServiceError::Pool(e) => ApiError::ConnectionPool(e),
            ServiceError::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = self.parts();
        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
