/// Login, registration and session endpoints
use crate::{
    api::middleware::validate_body,
    auth::{AuthContext, AuthSession, ChallengeStart, Registration},
    context::AppContext,
    db::account::UserAccount,
    error::{AuthError, AuthResult},
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/login/init", post(login_init))
        .route("/login/verify", post(login_verify))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/google-login", post(google_login))
        .route("/change-password", post(change_password))
        .route("/me", get(me))
        .route("/google-auth-url", get(google_auth_url))
}

// ========== Request bodies ==========

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1, message = "Challenge token is required"))]
    pub challenge_token: String,
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(range(min = 1, message = "Role is required"))]
    pub role_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    #[serde(alias = "googleToken")]
    #[validate(length(min = 1, message = "External token is required"))]
    pub external_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

// ========== Response bodies ==========

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge_required: bool,
    pub challenge_token: String,
    pub delivery_channel: String,
    pub masked_destination: String,
}

impl From<ChallengeStart> for ChallengeResponse {
    fn from(start: ChallengeStart) -> Self {
        Self {
            challenge_required: true,
            challenge_token: start.challenge_token,
            delivery_channel: "email".to_string(),
            masked_destination: start.masked_destination,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub role_id: i64,
    pub role_name: String,
    pub provider: String,
    pub profile_picture_url: Option<String>,
}

impl From<&UserAccount> for UserView {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role_id: user.role_id,
            role_name: user.role_name.clone(),
            provider: user.provider.to_string(),
            profile_picture_url: user.profile_picture_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: UserView::from(&session.user),
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
        }
    }
}

/// Current user, from access-token claims only
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role_id: i64,
    pub role_name: String,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

// ========== Handlers ==========

/// Check credentials and send a one-time code
async fn login_init(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<ChallengeResponse>> {
    validate_body(&req)?;
    let start = ctx.auth.begin_challenge(&req.email, &req.password).await?;
    Ok(Json(start.into()))
}

/// Exchange a challenge token and code for a session
async fn login_verify(
    State(ctx): State<AppContext>,
    Json(req): Json<VerifyCodeRequest>,
) -> AuthResult<Json<SessionResponse>> {
    validate_body(&req)?;
    let session = ctx
        .auth
        .verify_challenge(&req.challenge_token, &req.code)
        .await?;
    Ok(Json(session.into()))
}

/// Create a local account
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<Json<SessionResponse>> {
    validate_body(&req)?;
    let session = ctx
        .auth
        .register(Registration {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            password: req.password,
            role_id: req.role_id,
        })
        .await?;
    Ok(Json(session.into()))
}

/// Rotate a refresh token
async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshTokenRequest>,
) -> AuthResult<Json<SessionResponse>> {
    validate_body(&req)?;
    let session = ctx.auth.refresh(&req.refresh_token).await?;
    Ok(Json(session.into()))
}

/// Revoke a refresh token; succeeds whether or not it existed
async fn logout(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshTokenRequest>,
) -> AuthResult<Json<SuccessResponse>> {
    let revoked = ctx.auth.logout(&req.refresh_token).await?;
    tracing::debug!(revoked, "logout");
    Ok(Json(SuccessResponse { success: revoked }))
}

/// Sign in with a Google access token
async fn google_login(
    State(ctx): State<AppContext>,
    Json(req): Json<GoogleLoginRequest>,
) -> AuthResult<Json<SessionResponse>> {
    validate_body(&req)?;
    let session = ctx.auth.google_login(&req.external_token).await?;
    Ok(Json(session.into()))
}

/// Change the caller's password
async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Json<SuccessResponse>> {
    validate_body(&req)?;
    let changed = ctx
        .auth
        .change_password(auth.user_id, &req.current_password, &req.new_password)
        .await?;

    if !changed {
        return Err(AuthError::Validation(
            "Password could not be changed".to_string(),
        ));
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// Describe the caller from their access token
async fn me(auth: AuthContext) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        id: auth.user_id,
        email: auth.claims.email,
        display_name: auth.claims.name,
        role_id: auth.claims.role_id,
        role_name: auth.claims.role_name,
        provider: auth.claims.provider,
    })
}

/// Google consent-screen URL for the frontend
async fn google_auth_url(State(ctx): State<AppContext>) -> Json<AuthUrlResponse> {
    Json(AuthUrlResponse {
        auth_url: ctx.auth.google_auth_url(),
    })
}
