/// Unified error types for the authentication service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the auth service
///
/// Domain failures are tagged variants so callers can match on the kind of
/// rejection. Several of them share one external message (see `IntoResponse`).
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email, inactive account, non-local provider or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The one-time code could not be delivered
    #[error("Notification failure: {0}")]
    NotificationFailure(String),

    #[error("Challenge not found")]
    ChallengeNotFound,

    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Incorrect code")]
    IncorrectCode,

    /// Too many wrong codes submitted for one challenge
    #[error("Challenge attempts exhausted")]
    AttemptsExhausted,

    /// Account vanished or was deactivated mid-flow
    #[error("User not found or inactive")]
    UserInvalid,

    #[error("Invalid refresh token")]
    RefreshTokenInvalid,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    /// The identity provider rejected the external token
    #[error("External token invalid")]
    ExternalTokenInvalid,

    /// Password operation attempted on a non-local account
    #[error("Provider mismatch")]
    ProviderMismatch,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Role does not exist or is inactive")]
    RoleInvalidOrInactive,

    /// Missing or invalid bearer token on a protected route
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AuthError {
    /// Status, error code and client-facing message for this error
    ///
    /// Challenge failures share one message, as do refresh failures, so a
    /// client cannot tell which check rejected it.
    pub fn public_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "InvalidCredentials",
                "Invalid credentials".to_string(),
            ),
            AuthError::ChallengeNotFound
            | AuthError::ChallengeExpired
            | AuthError::IncorrectCode
            | AuthError::AttemptsExhausted => (
                StatusCode::UNAUTHORIZED,
                "InvalidCode",
                "Invalid or expired code".to_string(),
            ),
            AuthError::UserInvalid => (
                StatusCode::UNAUTHORIZED,
                "UserInvalid",
                "User not found or inactive".to_string(),
            ),
            AuthError::RefreshTokenInvalid | AuthError::RefreshTokenExpired => (
                StatusCode::UNAUTHORIZED,
                "InvalidRefreshToken",
                "Invalid or expired refresh token".to_string(),
            ),
            AuthError::ExternalTokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "InvalidExternalToken",
                "External token is invalid".to_string(),
            ),
            AuthError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            AuthError::ProviderMismatch => (
                StatusCode::BAD_REQUEST,
                "ProviderMismatch",
                "Password operations are not available for this account".to_string(),
            ),
            AuthError::EmailAlreadyRegistered => (
                StatusCode::CONFLICT,
                "EmailAlreadyRegistered",
                self.to_string(),
            ),
            AuthError::RoleInvalidOrInactive => (
                StatusCode::BAD_REQUEST,
                "InvalidRole",
                self.to_string(),
            ),
            AuthError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            AuthError::NotificationFailure(_) => (
                StatusCode::BAD_GATEWAY,
                "NotificationFailure",
                "Could not deliver the verification code".to_string(),
            ),
            AuthError::Database(_)
            | AuthError::Cache(_)
            | AuthError::Jwt(_)
            | AuthError::Internal(_)
            | AuthError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        }
    }
}

/// Convert AuthError to HTTP response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.public_parts();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for auth operations
pub type AuthResult<T> = Result<T, AuthError>;
