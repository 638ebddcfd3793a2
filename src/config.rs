/// Configuration management for the auth service
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub two_factor: TwoFactorConfig,
    pub cache: CacheConfig,
    pub email: Option<EmailConfig>,
    pub google: GoogleConfig,
    pub logging: LoggingConfig,
}

/// Execution mode
///
/// Only `Development` tolerates a failed code delivery (the code is logged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Production,
    Development,
}

impl ExecutionMode {
    /// Parse from `APP_ENV`; anything unrecognised is treated as production
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => ExecutionMode::Development,
            _ => ExecutionMode::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, ExecutionMode::Development)
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub mode: ExecutionMode,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
}

/// Token and password configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    /// Access token lifetime in minutes
    pub access_token_minutes: i64,
    /// Refresh session lifetime in days
    pub refresh_token_days: i64,
    /// bcrypt cost factor
    pub password_cost: u32,
    /// Role assigned to accounts created through Google login
    pub default_role_id: i64,
}

/// One-time code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorConfig {
    pub code_length: usize,
    /// Challenge lifetime in seconds
    pub code_ttl_secs: i64,
    /// Wrong submissions allowed per challenge, 0 disables the lockout
    pub max_attempts: u32,
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Use Redis; when false an in-process cache is used
    pub enabled: bool,
    pub redis_url: String,
    pub key_prefix: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub transport: EmailTransport,
    pub from_address: String,
}

/// Email delivery transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmailTransport {
    Smtp { smtp_url: String },
    Resend { api_key: String, api_url: String },
}

/// Google OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub userinfo_url: String,
    pub client_id: String,
    pub redirect_uri: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

const DEFAULT_LOG_FILTER: &str = "research_auth=debug,tower_http=debug";

impl LoggingConfig {
    /// Filter for the tracing subscriber; an unparsable level falls back to the default
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Read an env var and parse it, falling back to a default on absence or parse failure
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AuthResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("AUTH_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("AUTH_PORT")
            .unwrap_or_else(|_| "5080".to_string())
            .parse()
            .map_err(|_| AuthError::Validation("Invalid port number".to_string()))?;
        let mode = ExecutionMode::parse(&env::var("APP_ENV").unwrap_or_default());
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = env::var("AUTH_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("AUTH_ACCOUNT_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("accounts.sqlite"));

        let jwt_secret = env::var("JWT_SECRET_KEY")
            .map_err(|_| AuthError::Validation("JWT secret required".to_string()))?;
        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "ProyectoIntegrador".to_string());
        let audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "ProyectoIntegrador".to_string());

        let email = if let Ok(api_key) = env::var("RESEND_API_KEY") {
            Some(EmailConfig {
                transport: EmailTransport::Resend {
                    api_key,
                    api_url: env::var("RESEND_API_URL")
                        .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
                },
                from_address: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "onboarding@resend.dev".to_string()),
            })
        } else if let Ok(smtp_url) = env::var("EMAIL_SMTP_URL") {
            Some(EmailConfig {
                transport: EmailTransport::Smtp { smtp_url },
                from_address: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                mode,
                version,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
            },
            authentication: AuthConfig {
                jwt_secret,
                issuer,
                audience,
                access_token_minutes: env_or("JWT_EXPIRATION_MINUTES", 60),
                refresh_token_days: env_or("REFRESH_TOKEN_DAYS", 7),
                password_cost: env_or("BCRYPT_COST", 10),
                default_role_id: env_or("DEFAULT_ROLE_ID", 2),
            },
            two_factor: TwoFactorConfig {
                code_length: env_or("TWO_FACTOR_CODE_LENGTH", 6),
                code_ttl_secs: env_or("TWO_FACTOR_TTL_SECS", 600),
                max_attempts: env_or("TWO_FACTOR_MAX_ATTEMPTS", 5),
            },
            cache: CacheConfig {
                enabled: env_or("CACHE_ENABLED", false),
                redis_url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or_default(),
            },
            email,
            google: GoogleConfig {
                userinfo_url: env::var("GOOGLE_USERINFO_URL").unwrap_or_else(|_| {
                    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
                }),
                client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
                redirect_uri: env::var("GOOGLE_REDIRECT_URI").unwrap_or_else(|_| {
                    "http://localhost:3000/auth/google/callback".to_string()
                }),
            },
            logging: LoggingConfig {
                level: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
                json: env::var("LOG_FORMAT")
                    .map(|f| f.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AuthResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AuthError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AuthError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.access_token_minutes <= 0
            || self.authentication.refresh_token_days <= 0
        {
            return Err(AuthError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if !(4..=31).contains(&self.authentication.password_cost) {
            return Err(AuthError::Validation(
                "bcrypt cost must be between 4 and 31".to_string(),
            ));
        }

        if !(4..=10).contains(&self.two_factor.code_length) {
            return Err(AuthError::Validation(
                "Two-factor code length must be between 4 and 10".to_string(),
            ));
        }

        if self.two_factor.code_ttl_secs <= 0 {
            return Err(AuthError::Validation(
                "Two-factor code lifetime must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for tests and local tooling, with an in-memory cache and no email
    pub fn for_testing() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                mode: ExecutionMode::Production,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                account_db: PathBuf::from(":memory:"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                issuer: "ProyectoIntegrador".to_string(),
                audience: "ProyectoIntegrador".to_string(),
                access_token_minutes: 60,
                refresh_token_days: 7,
                password_cost: 4,
                default_role_id: 2,
            },
            two_factor: TwoFactorConfig {
                code_length: 6,
                code_ttl_secs: 600,
                max_attempts: 5,
            },
            cache: CacheConfig {
                enabled: false,
                redis_url: "redis://localhost:6379".to_string(),
                key_prefix: String::new(),
            },
            email: None,
            google: GoogleConfig {
                userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
                client_id: "test-client-id".to_string(),
                redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
            },
            logging: LoggingConfig {
                level: DEFAULT_LOG_FILTER.to_string(),
                json: false,
            },
        }
    }
}
