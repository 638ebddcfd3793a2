/// External identity provider (Google OAuth)
///
/// Resolves a Google access token into the profile the bridge needs, and
/// builds the consent-screen URL clients redirect to.

use crate::{
    config::GoogleConfig,
    error::{AuthError, AuthResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Profile returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Identity provider seam
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an external access token
    ///
    /// Every failure, including transport errors and malformed payloads,
    /// surfaces as `ExternalTokenInvalid`.
    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ExternalProfile>;
}

/// Google userinfo client
#[derive(Clone)]
pub struct GoogleIdentityClient {
    http_client: reqwest::Client,
    userinfo_url: String,
}

impl GoogleIdentityClient {
    pub fn new(config: &GoogleConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("research-auth/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            userinfo_url: config.userinfo_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityClient {
    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ExternalProfile> {
        if access_token.trim().is_empty() {
            return Err(AuthError::ExternalTokenInvalid);
        }

        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!("Google userinfo request failed: {}", e);
                AuthError::ExternalTokenInvalid
            })?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Google rejected access token");
            return Err(AuthError::ExternalTokenInvalid);
        }

        let profile: ExternalProfile = response.json().await.map_err(|e| {
            warn!("Malformed Google userinfo payload: {}", e);
            AuthError::ExternalTokenInvalid
        })?;

        if profile.id.is_empty() || profile.email.is_empty() {
            return Err(AuthError::ExternalTokenInvalid);
        }

        Ok(profile)
    }
}

/// Google consent-screen URL for the authorization-code flow
pub fn google_auth_url(config: &GoogleConfig) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline",
        GOOGLE_AUTH_ENDPOINT,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode("email profile"),
    )
}
