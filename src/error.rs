use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Machine-readable code carried by every CSRF rejection.
pub const INVALID_TOKEN_CODE: &str = "EBADCSRFTOKEN";

/// Human-readable status message carried by every CSRF rejection.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid csrf token";

// Type alias for construction-time results
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while a request passes through the CSRF middleware
///
/// Only [`CsrfError::InvalidToken`] is a CSRF failure. The other variants
/// describe host-side problems and are reported with their own status codes.
#[derive(Error, Debug)]
pub enum CsrfError {
    /// The submitted token was absent or did not verify against the secret
    #[error("invalid csrf token")]
    InvalidToken,

    /// A handler asked for the token accessor on a route without the middleware
    #[error("CSRF middleware is not installed for this route")]
    MissingContext,
}

impl CsrfError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CsrfError::InvalidToken => StatusCode::FORBIDDEN,
            CsrfError::MissingContext => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            CsrfError::InvalidToken => json!({
                "statusCode": status.as_u16(),
                "statusMessage": INVALID_TOKEN_MESSAGE,
                "data": {
                    "code": INVALID_TOKEN_CODE,
                },
            }),
            CsrfError::MissingContext => json!({
                "statusCode": status.as_u16(),
                "statusMessage": "internal server error",
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Errors raised while building the middleware configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Cookie name must not be empty")]
    EmptyCookieName,

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}
