/// Google OAuth bridge
///
/// Resolves a Google access token to a local account, linking or creating it
/// as needed. Logins through this path skip the two-factor step.

use crate::{
    db::account::{NewUser, Provider, UserAccount},
    error::{AuthError, AuthResult},
    identity::IdentityProvider,
    users::UserStore,
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct GoogleBridge {
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityProvider>,
    default_role_id: i64,
}

impl GoogleBridge {
    pub fn new(
        users: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
        default_role_id: i64,
    ) -> Self {
        Self {
            users,
            identity,
            default_role_id,
        }
    }

    /// Find, link or create the account behind an external token
    pub async fn login_with_google_token(&self, external_token: &str) -> AuthResult<UserAccount> {
        let profile = self.identity.fetch_profile(external_token).await?;

        let existing = match self.users.find_user_by_external_id(&profile.id).await? {
            Some(user) => Some(user),
            None => self.users.find_user_by_email(&profile.email).await?,
        };

        let user = match existing {
            Some(mut user) => {
                if !user.is_active {
                    return Err(AuthError::UserInvalid);
                }
                if user.google_id.as_deref() != Some(profile.id.as_str()) {
                    user.google_id = Some(profile.id.clone());
                    user.provider = Provider::Google;
                    user = self.users.update_user(&user).await?;
                    info!(user_id = user.id, "linked Google identity to existing account");
                }
                user
            }
            None => {
                match self.users.find_role_by_id(self.default_role_id).await? {
                    Some(role) if role.is_active => {}
                    _ => return Err(AuthError::RoleInvalidOrInactive),
                }

                let user = self
                    .users
                    .create_user(NewUser {
                        email: profile.email.clone(),
                        first_name: profile.given_name.clone().unwrap_or_default(),
                        last_name: profile.family_name.clone().unwrap_or_default(),
                        password_hash: None,
                        provider: Provider::Google,
                        google_id: Some(profile.id.clone()),
                        profile_picture_url: profile.picture.clone(),
                        role_id: self.default_role_id,
                    })
                    .await?;
                info!(user_id = user.id, "created account from Google profile");
                user
            }
        };

        Ok(user)
    }
}
