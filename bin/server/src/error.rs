//! HTTP error mapping.
//!
//! Library failures arrive as `rootcause` reports or `sqlx` errors; handlers
//! convert them into [`ApiError`], which decides the status code and the body
//! returned to the client. Internal details are logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lexcase_access::AuthorizationError;
use serde_json::json;
use std::fmt;

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// No valid session.
    AuthenticationRequired,
    /// Valid session, but not allowed.
    Forbidden,
    /// Resource does not exist or is not visible to the caller.
    NotFound,
    /// The request was malformed.
    BadRequest { details: String },
    /// The request conflicts with current state.
    Conflict { details: String },
    /// Something failed on our side.
    Internal { details: String },
}

impl ApiError {
    /// Wraps any displayable failure as an internal error.
    pub fn internal(e: impl fmt::Display) -> Self {
        Self::Internal {
            details: e.to_string(),
        }
    }

    /// Wraps a validation failure as a bad request.
    pub fn bad_request(e: impl fmt::Display) -> Self {
        Self::BadRequest {
            details: e.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticationRequired => write!(f, "authentication required"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not found"),
            Self::BadRequest { details } => write!(f, "bad request: {}", details),
            Self::Conflict { details } => write!(f, "conflict: {}", details),
            Self::Internal { details } => write!(f, "internal error: {}", details),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::internal(e)
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(e: AuthorizationError) -> Self {
        match e {
            AuthorizationError::NotAuthenticated => Self::AuthenticationRequired,
            AuthorizationError::PermissionDenied { .. } => {
                tracing::debug!(reason = %e, "request forbidden");
                Self::Forbidden
            }
            AuthorizationError::NotFound { .. } => Self::NotFound,
            AuthorizationError::CheckFailed { reason } => Self::Internal { details: reason },
        }
    }
}

/// Failures that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// The listener could not bind or serve.
    Server { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {}", details),
            Self::Database { details } => write!(f, "database error: {}", details),
            Self::Server { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for StartupError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::AuthenticationRequired => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::BadRequest { details } => (StatusCode::BAD_REQUEST, details.clone()),
            Self::Conflict { details } => (StatusCode::CONFLICT, details.clone()),
            Self::Internal { details } => {
                tracing::error!(error = %details, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (ApiError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::bad_request("bad key"), StatusCode::BAD_REQUEST),
            (
                ApiError::Conflict {
                    details: "system role".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (ApiError::internal("db down"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn hidden_resources_map_to_not_found() {
        let error = ApiError::from(AuthorizationError::NotFound {
            resource: "expediente:42".to_string(),
        });
        assert!(matches!(error, ApiError::NotFound));

        let error = ApiError::from(AuthorizationError::PermissionDenied {
            user_id: lexcase_core::UserId::new(),
            action: "read".to_string(),
            resource: "user_permissions".to_string(),
        });
        assert!(matches!(error, ApiError::Forbidden));
    }
}
