/// Access and refresh token issuance
///
/// Access tokens are stateless HS256 JWTs. Refresh tokens are opaque values
/// whose `RefreshSession` lives in the session cache; each one is single-use
/// and replaced on every refresh.

use super::tokens::generate_opaque_token;
use crate::{
    cache::{categories, SessionCache},
    config::AuthConfig,
    db::account::UserAccount,
    error::{AuthError, AuthResult},
    metrics,
    users::UserStore,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    pub email: String,
    /// Display name
    pub name: String,
    pub role_id: i64,
    pub role_name: String,
    pub provider: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> AuthResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AuthError::Authentication("Invalid subject claim".to_string()))
    }
}

/// Cached state behind a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSession {
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Token pair handed to the client, with the account it was minted for
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of the access token
    pub expires_at: DateTime<Utc>,
    pub user: UserAccount,
}

/// Mints, rotates and revokes sessions
#[derive(Clone)]
pub struct TokenIssuer {
    users: Arc<dyn UserStore>,
    cache: SessionCache,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(users: Arc<dyn UserStore>, cache: SessionCache, config: &AuthConfig) -> Self {
        Self {
            users,
            cache,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    /// Issue a new access token and refresh session for `user`
    pub async fn issue_session(&self, user: &UserAccount) -> AuthResult<AuthSession> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;

        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name(),
            role_id: user.role_id,
            role_name: user.role_name.clone(),
            provider: user.provider.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Jwt(format!("Failed to generate token: {}", e)))?;

        let refresh_token = generate_opaque_token();
        let record = RefreshSession {
            user_id: user.id,
            issued_at: now,
            expires_at: now + self.refresh_ttl,
        };
        self.cache
            .set(
                categories::REFRESH,
                &refresh_token,
                &record,
                self.refresh_ttl.num_seconds().max(1) as u64,
            )
            .await?;

        debug!(user_id = user.id, "session issued");

        Ok(AuthSession {
            access_token,
            refresh_token,
            expires_at,
            user: user.clone(),
        })
    }

    /// Exchange a refresh token for a new session
    ///
    /// The old record is removed before the new pair is minted, so a token can
    /// be redeemed at most once even under concurrent use.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let Some(record) = self
            .cache
            .get::<RefreshSession>(categories::REFRESH, refresh_token)
            .await?
        else {
            metrics::record_refresh("invalid");
            return Err(AuthError::RefreshTokenInvalid);
        };

        if Utc::now() > record.expires_at {
            self.cache.delete(categories::REFRESH, refresh_token).await?;
            metrics::record_refresh("expired");
            return Err(AuthError::RefreshTokenExpired);
        }

        let user = match self.users.find_user_by_id(record.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.cache.delete(categories::REFRESH, refresh_token).await?;
                metrics::record_refresh("user_invalid");
                return Err(AuthError::UserInvalid);
            }
        };

        if !self.cache.delete(categories::REFRESH, refresh_token).await? {
            warn!(user_id = user.id, "refresh token redeemed concurrently");
            metrics::record_refresh("invalid");
            return Err(AuthError::RefreshTokenInvalid);
        }

        let session = self.issue_session(&user).await?;
        metrics::record_refresh("rotated");
        metrics::record_session_issued("refresh");
        Ok(session)
    }

    /// Revoke a refresh token; returns whether it existed
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<bool> {
        let existed = self.cache.delete(categories::REFRESH, refresh_token).await?;
        if existed {
            info!("refresh session revoked");
        }
        Ok(existed)
    }

    /// Validate signature, issuer, audience and expiry of an access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 30;

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("JWT verification failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AuthError::Authentication("Token has expired".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::Authentication("Invalid token signature".to_string())
                    }
                    _ => AuthError::Authentication("Invalid token".to_string()),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::{
        account::{NewUser, Provider},
        create_memory_pool,
    };
    use crate::users::SqliteUserStore;

    async fn setup() -> (TokenIssuer, Arc<dyn UserStore>, SessionCache) {
        let users: Arc<dyn UserStore> =
            Arc::new(SqliteUserStore::new(create_memory_pool().await.unwrap()));
        let cache = SessionCache::in_memory();
        let config = ServerConfig::for_testing();
        (
            TokenIssuer::new(users.clone(), cache.clone(), &config.authentication),
            users,
            cache,
        )
    }

    async fn create_user(users: &Arc<dyn UserStore>) -> UserAccount {
        users
            .create_user(NewUser {
                email: "ana@lab.org".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Perez".to_string(),
                password_hash: Some("$2b$04$unused".to_string()),
                provider: Provider::Local,
                google_id: None,
                profile_picture_url: None,
                role_id: 1,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_access_token_claims() {
        let (issuer, users, _) = setup().await;
        let user = create_user(&users).await;

        let session = issuer.issue_session(&user).await.unwrap();
        let claims = issuer.verify_access_token(&session.access_token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.email, "ana@lab.org");
        assert_eq!(claims.name, "Ana Perez");
        assert_eq!(claims.role_name, "Admin");
        assert_eq!(claims.provider, "local");
        assert_eq!(claims.exp, session.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 60 * 60);
    }

    #[tokio::test]
    async fn test_refresh_record_ttl() {
        let (issuer, users, cache) = setup().await;
        let user = create_user(&users).await;

        let session = issuer.issue_session(&user).await.unwrap();
        let ttl = cache
            .ttl(categories::REFRESH, &session.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert!(ttl > 7 * 24 * 3600 - 5 && ttl <= 7 * 24 * 3600);
    }

    #[tokio::test]
    async fn test_foreign_tokens_rejected() {
        let (issuer, users, _) = setup().await;
        let user = create_user(&users).await;
        let session = issuer.issue_session(&user).await.unwrap();

        let mut other_config = ServerConfig::for_testing().authentication;
        other_config.audience = "someone-else".to_string();
        let other = TokenIssuer::new(users.clone(), SessionCache::in_memory(), &other_config);
        assert!(matches!(
            other.verify_access_token(&session.access_token),
            Err(AuthError::Authentication(_))
        ));

        let mut tampered = session.access_token.clone();
        tampered.push('x');
        assert!(issuer.verify_access_token(&tampered).is_err());
        assert!(issuer.verify_access_token("garbage").is_err());
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let (issuer, users, _) = setup().await;
        let user = create_user(&users).await;

        let first = issuer.issue_session(&user).await.unwrap();
        let second = issuer.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        assert!(matches!(
            issuer.refresh(&first.refresh_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
        assert!(issuer.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_refresh_record_deleted() {
        let (issuer, users, cache) = setup().await;
        let user = create_user(&users).await;

        let stale = RefreshSession {
            user_id: user.id,
            issued_at: Utc::now() - Duration::days(8),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        cache
            .set(categories::REFRESH, "stale", &stale, 60)
            .await
            .unwrap();

        assert!(matches!(
            issuer.refresh("stale").await,
            Err(AuthError::RefreshTokenExpired)
        ));
        assert!(matches!(
            issuer.refresh("stale").await,
            Err(AuthError::RefreshTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_deactivated_user() {
        let (issuer, users, _) = setup().await;
        let mut user = create_user(&users).await;
        let session = issuer.issue_session(&user).await.unwrap();

        user.is_active = false;
        users.update_user(&user).await.unwrap();

        assert!(matches!(
            issuer.refresh(&session.refresh_token).await,
            Err(AuthError::UserInvalid)
        ));
        assert!(matches!(
            issuer.refresh(&session.refresh_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
    }

    #[tokio::test]
    async fn test_logout_idempotent() {
        let (issuer, users, _) = setup().await;
        let user = create_user(&users).await;
        let session = issuer.issue_session(&user).await.unwrap();

        assert!(issuer.logout(&session.refresh_token).await.unwrap());
        assert!(!issuer.logout(&session.refresh_token).await.unwrap());
        assert!(!issuer.logout("never-issued").await.unwrap());
        assert!(matches!(
            issuer.refresh(&session.refresh_token).await,
            Err(AuthError::RefreshTokenInvalid)
        ));
    }
}
