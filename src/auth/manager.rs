/// Authentication facade
///
/// `AuthSessionManager` wires the credential verifier, challenge issuer, token
/// issuer and Google bridge together and exposes the operations the HTTP
/// layer calls.

use super::{
    challenge::{ChallengeIssuer, ChallengeStart},
    credentials::CredentialVerifier,
    google::GoogleBridge,
    session::{AccessClaims, AuthSession, TokenIssuer},
};
use crate::{
    cache::SessionCache,
    config::{GoogleConfig, ServerConfig},
    db::account::{NewUser, Provider},
    error::{AuthError, AuthResult},
    identity::{google_auth_url, IdentityProvider},
    mailer::EmailSender,
    metrics,
    users::UserStore,
};
use std::sync::Arc;
use tracing::info;
use validator::ValidateEmail;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Fields for a new local account
#[derive(Debug, Clone)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role_id: i64,
}

/// Facade over the authentication flows
#[derive(Clone)]
pub struct AuthSessionManager {
    users: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    challenges: ChallengeIssuer,
    tokens: TokenIssuer,
    google: GoogleBridge,
    google_config: GoogleConfig,
}

impl AuthSessionManager {
    pub fn new(
        config: &ServerConfig,
        users: Arc<dyn UserStore>,
        cache: SessionCache,
        mailer: Arc<dyn EmailSender>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let verifier = CredentialVerifier::new(users.clone(), config.authentication.password_cost);
        let challenges = ChallengeIssuer::new(
            verifier.clone(),
            users.clone(),
            cache.clone(),
            mailer,
            config.two_factor.clone(),
            config.service.mode,
        );
        let tokens = TokenIssuer::new(users.clone(), cache, &config.authentication);
        let google = GoogleBridge::new(
            users.clone(),
            identity,
            config.authentication.default_role_id,
        );

        Self {
            users,
            verifier,
            challenges,
            tokens,
            google,
            google_config: config.google.clone(),
        }
    }

    /// First login step: check credentials and send a code
    pub async fn begin_challenge(&self, email: &str, password: &str) -> AuthResult<ChallengeStart> {
        self.challenges.begin_challenge(email, password).await
    }

    /// Second login step: check the code and issue a session
    pub async fn verify_challenge(&self, challenge_token: &str, code: &str) -> AuthResult<AuthSession> {
        let user = self.challenges.verify_challenge(challenge_token, code).await?;
        let session = self.tokens.issue_session(&user).await?;
        metrics::record_session_issued("two_factor");
        Ok(session)
    }

    /// Create a local account and sign it in
    pub async fn register(&self, registration: Registration) -> AuthResult<AuthSession> {
        let Registration {
            first_name,
            last_name,
            email,
            password,
            role_id,
        } = registration;

        let first_name = first_name.trim().to_string();
        let last_name = last_name.trim().to_string();
        let email = email.trim().to_string();

        if first_name.is_empty() || last_name.is_empty() {
            return Err(AuthError::Validation("First and last name are required".to_string()));
        }
        if !email.validate_email() {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        match self.users.find_role_by_id(role_id).await? {
            Some(role) if role.is_active => {}
            _ => return Err(AuthError::RoleInvalidOrInactive),
        }

        let password_hash = self.verifier.hash_password(&password).await?;
        let user = self
            .users
            .create_user(NewUser {
                email,
                first_name,
                last_name,
                password_hash: Some(password_hash),
                provider: Provider::Local,
                google_id: None,
                profile_picture_url: None,
                role_id,
            })
            .await?;

        info!(user_id = user.id, "account registered");

        let session = self.tokens.issue_session(&user).await?;
        metrics::record_session_issued("register");
        Ok(session)
    }

    /// Rotate a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        self.tokens.refresh(refresh_token).await
    }

    /// Revoke a refresh token; returns whether it existed
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<bool> {
        self.tokens.logout(refresh_token).await
    }

    /// Sign in with a Google access token
    pub async fn google_login(&self, external_token: &str) -> AuthResult<AuthSession> {
        let user = self.google.login_with_google_token(external_token).await?;
        let session = self.tokens.issue_session(&user).await?;
        metrics::record_session_issued("google");
        Ok(session)
    }

    /// Change the password of a local account
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<bool> {
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        self.verifier
            .change_password(user_id, current_password, new_password)
            .await
    }

    /// Validate a bearer access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.tokens.verify_access_token(token)
    }

    /// Google consent-screen URL
    pub fn google_auth_url(&self) -> String {
        google_auth_url(&self.google_config)
    }
}
