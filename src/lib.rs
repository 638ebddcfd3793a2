/// Research project manager: authentication service
///
/// Two-step login (password, then an emailed one-time code), Google sign-in,
/// and JWT access tokens paired with rotating refresh tokens.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod mailer;
pub mod metrics;
pub mod server;
pub mod users;

pub use auth::AuthSessionManager;
pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AuthError, AuthResult};
