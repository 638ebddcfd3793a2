/// Email/password verification against stored accounts
use super::password::{hash_password, verify_password};
use crate::{
    db::account::{Provider, UserAccount},
    error::{AuthError, AuthResult},
    users::UserStore,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Checks local credentials and manages password hashes
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    password_cost: u32,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, password_cost: u32) -> Self {
        Self {
            users,
            password_cost,
        }
    }

    /// Resolve an active local account by email and password
    ///
    /// Unknown email, inactive account, non-local provider and wrong password
    /// all fail with the same `InvalidCredentials`.
    pub async fn verify(&self, email: &str, password: &str) -> AuthResult<UserAccount> {
        let Some(user) = self.users.find_user_by_email(email).await? else {
            debug!("credential check failed: no such account");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active {
            debug!(user_id = user.id, "credential check failed: inactive account");
            return Err(AuthError::InvalidCredentials);
        }

        // Google accounts never reach a password comparison
        let hash = match (&user.provider, user.password_hash.as_deref()) {
            (Provider::Local, Some(hash)) if !hash.is_empty() => hash,
            _ => {
                debug!(
                    user_id = user.id,
                    provider = %user.provider,
                    "credential check failed: not a local account"
                );
                return Err(AuthError::InvalidCredentials);
            }
        };

        let valid = verify_password(password, hash).await.unwrap_or_else(|e| {
            error!(user_id = user.id, "stored password hash unusable: {}", e);
            false
        });

        if !valid {
            debug!(user_id = user.id, "credential check failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Hash a new password with the configured cost
    pub async fn hash_password(&self, password: &str) -> AuthResult<String> {
        hash_password(password, self.password_cost).await
    }

    /// Replace the password of a local account
    ///
    /// Returns `false` when the account is missing or inactive. Existing
    /// refresh sessions stay valid.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<bool> {
        let Some(mut user) = self.users.find_user_by_id(user_id).await? else {
            return Ok(false);
        };

        if !user.is_active {
            return Ok(false);
        }

        if !user.is_local() {
            return Err(AuthError::ProviderMismatch);
        }

        let current_hash = user.password_hash.clone().unwrap_or_default();
        let valid = !current_hash.is_empty()
            && verify_password(current_password, &current_hash)
                .await
                .unwrap_or(false);
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        user.password_hash = Some(self.hash_password(new_password).await?);
        self.users.update_user(&user).await?;

        info!(user_id, "password changed");
        Ok(true)
    }
}
