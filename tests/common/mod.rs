//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use research_auth::{
    auth::password::hash_password,
    cache::{MemoryCache, SessionCache},
    config::ServerConfig,
    context::AppContext,
    db::{
        self,
        account::{NewUser, Provider, UserAccount},
    },
    error::{AuthError, AuthResult},
    identity::{ExternalProfile, IdentityProvider},
    mailer::EmailSender,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const PASSWORD: &str = "correct-horse-battery";

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Mailer that keeps every message in memory
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn last(&self) -> Option<SentEmail> {
        self.sent.lock().await.last().cloned()
    }

    /// First run of exactly `length` digits in the last message body
    pub async fn last_code(&self, length: usize) -> String {
        let html = self.last().await.expect("no email sent").html;
        let bytes = html.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i].is_ascii_digit() {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i - start == length {
                    return html[start..i].to_string();
                }
            } else {
                i += 1;
            }
        }
        panic!("no {}-digit code in email body", length);
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> AuthResult<()> {
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html_body.to_string(),
        });
        Ok(())
    }
}

/// Mailer whose transport is always down
pub struct FailingMailer;

#[async_trait]
impl EmailSender for FailingMailer {
    async fn send_email(&self, _to: &str, _subject: &str, _html_body: &str) -> AuthResult<()> {
        Err(AuthError::NotificationFailure("connection refused".to_string()))
    }
}

/// Identity provider answering from a fixed token table
#[derive(Default)]
pub struct StubIdentity {
    profiles: HashMap<String, ExternalProfile>,
}

impl StubIdentity {
    pub fn with_profile(mut self, token: &str, profile: ExternalProfile) -> Self {
        self.profiles.insert(token.to_string(), profile);
        self
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ExternalProfile> {
        self.profiles
            .get(access_token)
            .cloned()
            .ok_or(AuthError::ExternalTokenInvalid)
    }
}

pub fn google_profile(id: &str, email: &str) -> ExternalProfile {
    ExternalProfile {
        id: id.to_string(),
        email: email.to_string(),
        given_name: Some("Grace".to_string()),
        family_name: Some("Hopper".to_string()),
        picture: Some("https://example.com/grace.png".to_string()),
    }
}

pub struct TestEnv {
    pub ctx: AppContext,
    pub mailer: Arc<RecordingMailer>,
    pub cache_backend: Arc<MemoryCache>,
}

impl TestEnv {
    /// Insert an active local account with `PASSWORD`
    pub async fn local_user(&self, email: &str) -> UserAccount {
        self.ctx
            .users
            .create_user(NewUser {
                email: email.to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                password_hash: Some(hash_password(PASSWORD, 4).await.unwrap()),
                provider: Provider::Local,
                google_id: None,
                profile_picture_url: None,
                role_id: 2,
            })
            .await
            .unwrap()
    }

    /// Insert a Google-provisioned account without a password
    pub async fn google_user(&self, email: &str, google_id: &str) -> UserAccount {
        self.ctx
            .users
            .create_user(NewUser {
                email: email.to_string(),
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                password_hash: None,
                provider: Provider::Google,
                google_id: Some(google_id.to_string()),
                profile_picture_url: None,
                role_id: 2,
            })
            .await
            .unwrap()
    }

    pub async fn deactivate(&self, user: &UserAccount) {
        let mut user = user.clone();
        user.is_active = false;
        self.ctx.users.update_user(&user).await.unwrap();
    }
}

pub async fn setup() -> TestEnv {
    setup_with(ServerConfig::for_testing(), StubIdentity::default()).await
}

pub async fn setup_with(config: ServerConfig, identity: StubIdentity) -> TestEnv {
    let mailer = Arc::new(RecordingMailer::default());
    setup_with_mailer(config, identity, mailer.clone(), mailer).await
}

pub async fn setup_with_mailer(
    config: ServerConfig,
    identity: StubIdentity,
    recorder: Arc<RecordingMailer>,
    mailer: Arc<dyn EmailSender>,
) -> TestEnv {
    let pool = db::create_memory_pool().await.unwrap();
    let cache_backend = Arc::new(MemoryCache::new());
    let cache = SessionCache::new(cache_backend.clone(), config.cache.key_prefix.clone());

    let ctx = AppContext::from_parts(config, pool, cache, mailer, Arc::new(identity));

    TestEnv {
        ctx,
        mailer: recorder,
        cache_backend,
    }
}
