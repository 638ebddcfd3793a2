/// Two-factor challenges
///
/// A challenge is a one-time numeric code bound to an opaque token. The record
/// lives in the session cache under `challenge:{token}` for the configured
/// window. A wrong code keeps the same token alive with its attempt counter
/// bumped and its remaining TTL untouched.

use super::{
    credentials::CredentialVerifier,
    tokens::{generate_numeric_code, generate_opaque_token, mask_email},
};
use crate::{
    cache::{categories, SessionCache},
    config::{ExecutionMode, TwoFactorConfig},
    db::account::UserAccount,
    error::{AuthError, AuthResult},
    mailer::{two_factor_email, EmailSender},
    metrics,
    users::UserStore,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Cached state of an outstanding challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChallenge {
    pub user_id: i64,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Wrong submissions so far
    pub attempts: u32,
}

/// Result of a successful first login step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeStart {
    pub challenge_token: String,
    pub masked_destination: String,
}

/// Creates, delivers and checks one-time codes
#[derive(Clone)]
pub struct ChallengeIssuer {
    verifier: CredentialVerifier,
    users: Arc<dyn UserStore>,
    cache: SessionCache,
    mailer: Arc<dyn EmailSender>,
    config: TwoFactorConfig,
    mode: ExecutionMode,
}

impl ChallengeIssuer {
    pub fn new(
        verifier: CredentialVerifier,
        users: Arc<dyn UserStore>,
        cache: SessionCache,
        mailer: Arc<dyn EmailSender>,
        config: TwoFactorConfig,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            verifier,
            users,
            cache,
            mailer,
            config,
            mode,
        }
    }

    /// Verify credentials, then create and email a code
    ///
    /// The code itself is never returned.
    pub async fn begin_challenge(&self, email: &str, password: &str) -> AuthResult<ChallengeStart> {
        let user = self.verifier.verify(email, password).await?;

        let challenge_token = generate_opaque_token();
        let code = generate_numeric_code(self.config.code_length);
        let now = Utc::now();
        let record = PendingChallenge {
            user_id: user.id,
            code: code.clone(),
            issued_at: now,
            expires_at: now + Duration::seconds(self.config.code_ttl_secs),
            attempts: 0,
        };

        self.cache
            .set(
                categories::CHALLENGE,
                &challenge_token,
                &record,
                self.config.code_ttl_secs as u64,
            )
            .await?;

        let masked_destination = mask_email(&user.email);

        let valid_minutes = (self.config.code_ttl_secs + 59) / 60;
        let (subject, html) = two_factor_email(&code, valid_minutes);
        if let Err(e) = self.mailer.send_email(&user.email, &subject, &html).await {
            if self.mode.is_development() {
                warn!(
                    user_id = user.id,
                    code = %code,
                    "Code delivery failed ({}), continuing in development mode",
                    e
                );
            } else {
                error!(user_id = user.id, "Code delivery failed: {}", e);
                return Err(match e {
                    AuthError::NotificationFailure(msg) => AuthError::NotificationFailure(msg),
                    other => AuthError::NotificationFailure(other.to_string()),
                });
            }
        }

        metrics::record_challenge_issued();
        info!(user_id = user.id, "two-factor challenge issued");

        Ok(ChallengeStart {
            challenge_token,
            masked_destination,
        })
    }

    /// Check a submitted code and resolve the account it was issued for
    pub async fn verify_challenge(&self, challenge_token: &str, code: &str) -> AuthResult<UserAccount> {
        let Some(mut record) = self
            .cache
            .get::<PendingChallenge>(categories::CHALLENGE, challenge_token)
            .await?
        else {
            metrics::record_challenge_failure("not_found");
            return Err(AuthError::ChallengeNotFound);
        };

        let now = Utc::now();
        if now > record.expires_at {
            self.cache.delete(categories::CHALLENGE, challenge_token).await?;
            metrics::record_challenge_failure("expired");
            return Err(AuthError::ChallengeExpired);
        }

        if !codes_match(&record.code, code) {
            return Err(self.record_wrong_code(challenge_token, &mut record, now).await?);
        }

        self.cache.delete(categories::CHALLENGE, challenge_token).await?;

        match self.users.find_user_by_id(record.user_id).await? {
            Some(user) if user.is_active => {
                debug!(user_id = user.id, "two-factor challenge passed");
                Ok(user)
            }
            _ => {
                metrics::record_challenge_failure("user_invalid");
                Err(AuthError::UserInvalid)
            }
        }
    }

    /// Bump the attempt counter, returning the error to report
    async fn record_wrong_code(
        &self,
        challenge_token: &str,
        record: &mut PendingChallenge,
        now: DateTime<Utc>,
    ) -> AuthResult<AuthError> {
        record.attempts += 1;

        if self.config.max_attempts > 0 && record.attempts >= self.config.max_attempts {
            self.cache.delete(categories::CHALLENGE, challenge_token).await?;
            metrics::record_challenge_failure("attempts_exhausted");
            warn!(user_id = record.user_id, "challenge locked after too many wrong codes");
            return Ok(AuthError::AttemptsExhausted);
        }

        let remaining = match self.cache.ttl(categories::CHALLENGE, challenge_token).await? {
            Some(ttl) => ttl,
            None => (record.expires_at - now).num_seconds(),
        };

        if remaining <= 0 {
            self.cache.delete(categories::CHALLENGE, challenge_token).await?;
            metrics::record_challenge_failure("expired");
            return Ok(AuthError::ChallengeExpired);
        }

        self.cache
            .set(categories::CHALLENGE, challenge_token, &*record, remaining as u64)
            .await?;

        metrics::record_challenge_failure("incorrect_code");
        debug!(user_id = record.user_id, attempts = record.attempts, "incorrect code");
        Ok(AuthError::IncorrectCode)
    }
}

/// Exact comparison that does not stop at the first differing byte
fn codes_match(expected: &str, submitted: &str) -> bool {
    let (a, b) = (expected.as_bytes(), submitted.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match() {
        assert!(codes_match("012345", "012345"));
        assert!(!codes_match("012345", "012346"));
        assert!(!codes_match("012345", "01234"));
        assert!(!codes_match("012345", " 012345"));
        assert!(!codes_match("012345", ""));
    }

    #[test]
    fn test_pending_challenge_json_shape() {
        let now = Utc::now();
        let record = PendingChallenge {
            user_id: 3,
            code: "000123".to_string(),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
            attempts: 0,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["code"], "000123");
        assert_eq!(json["attempts"], 0);

        let back: PendingChallenge = serde_json::from_value(json).unwrap();
        assert_eq!(back.expires_at, record.expires_at);
    }
}
