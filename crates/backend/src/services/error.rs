//! Error taxonomy shared by the meeting and calendar services.

use thiserror::Error;

use crate::calendar_client::GatewayError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Meeting, user, transcript, event or recording does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The user's calendar token is missing, revoked or expired
    #[error("calendar authorization expired: {0}")]
    AuthExpired(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Non-auth failure reported by the calendar provider
    #[error("calendar provider error: {0}")]
    Provider(#[source] GatewayError),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database connection error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    /// Query failures surfaced by the `db` helpers
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ServiceError::NotFound(resource.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    /// Split provider failures into re-authorization prompts and plain
    /// provider errors.
    pub fn from_gateway(err: GatewayError) -> Self {
        if err.is_auth_failure() {
            ServiceError::AuthExpired(err.to_string())
        } else {
            ServiceError::Provider(err)
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_auth_failures_become_auth_expired() {
        let err = ServiceError::from_gateway(GatewayError::Status {
            status: 401,
            body: "unauthorized".into(),
        });
        assert!(matches!(err, ServiceError::AuthExpired(_)));

        let err = ServiceError::from_gateway(GatewayError::Status {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.into(),
        });
        assert!(matches!(err, ServiceError::AuthExpired(_)));
    }

    #[test]
    fn test_other_gateway_failures_stay_provider_errors() {
        let err = ServiceError::from_gateway(GatewayError::Status {
            status: 500,
            body: "backend error".into(),
        });
        assert!(matches!(err, ServiceError::Provider(_)));

        let err = ServiceError::from_gateway(GatewayError::Timeout);
        assert!(matches!(err, ServiceError::Provider(_)));
    }
}
