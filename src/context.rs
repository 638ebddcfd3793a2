/// Application context and dependency injection
use crate::{
    auth::AuthSessionManager,
    cache::SessionCache,
    config::ServerConfig,
    db,
    error::AuthResult,
    identity::{GoogleIdentityClient, IdentityProvider},
    mailer::{build_mailer, EmailSender},
    users::{SqliteUserStore, UserStore},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub account_db: SqlitePool,
    pub users: Arc<dyn UserStore>,
    pub cache: SessionCache,
    pub auth: Arc<AuthSessionManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AuthResult<Self> {
        config.validate()?;

        if config.service.mode.is_development() {
            tracing::warn!("Running in development mode: undelivered codes are logged");
        }

        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        // Account database
        let account_db =
            db::create_pool(&config.storage.account_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&account_db).await?;
        db::test_connection(&account_db).await?;
        info!("✓ Account database ready");

        let cache = SessionCache::from_config(&config.cache).await?;
        let mailer = build_mailer(config.email.as_ref())?;
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(GoogleIdentityClient::new(&config.google)?);

        Ok(Self::from_parts(config, account_db, cache, mailer, identity))
    }

    /// Assemble a context from already-built collaborators
    pub fn from_parts(
        config: ServerConfig,
        account_db: SqlitePool,
        cache: SessionCache,
        mailer: Arc<dyn EmailSender>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(account_db.clone()));
        let auth = Arc::new(AuthSessionManager::new(
            &config,
            users.clone(),
            cache.clone(),
            mailer,
            identity,
        ));

        Self {
            config: Arc::new(config),
            account_db,
            users,
            cache,
            auth,
        }
    }
}
