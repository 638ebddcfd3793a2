/// Request helpers shared by the handlers
use crate::error::{AuthError, AuthResult};
use axum::http::HeaderMap;
use validator::Validate;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Run derive-based validation on a request body
pub fn validate_body<T: Validate>(body: &T) -> AuthResult<()> {
    body.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))
}
