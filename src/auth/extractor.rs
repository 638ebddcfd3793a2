/// Authentication extractor for protected routes
use super::session::AccessClaims;
use crate::{api::middleware::extract_bearer_token, context::AppContext, error::AuthError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated caller, resolved from the bearer access token
///
/// Built purely from the token claims; no store lookup.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub claims: AccessClaims,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AuthError::Authentication("Missing authorization header".to_string()))?;

        let claims = state.auth.verify_access_token(&token)?;
        let user_id = claims.user_id()?;

        Ok(AuthContext { user_id, claims })
    }
}
