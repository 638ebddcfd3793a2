/// User persistence
///
/// `UserStore` is the seam the auth core talks to. `SqliteUserStore` is the
/// production implementation over the sqlx pool, using runtime queries so no
/// DATABASE_URL is needed at compile time.

use crate::{
    db::account::{normalize_email, NewUser, Provider, Role, UserAccount},
    error::{AuthError, AuthResult},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

/// Persistence operations needed by the authentication flows
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup by email
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<UserAccount>>;

    async fn find_user_by_id(&self, id: i64) -> AuthResult<Option<UserAccount>>;

    /// Lookup by Google account id
    async fn find_user_by_external_id(&self, external_id: &str)
        -> AuthResult<Option<UserAccount>>;

    async fn create_user(&self, user: NewUser) -> AuthResult<UserAccount>;

    /// Persist the mutable fields of an existing account
    async fn update_user(&self, user: &UserAccount) -> AuthResult<UserAccount>;

    async fn find_role_by_id(&self, id: i64) -> AuthResult<Option<Role>>;
}

const USER_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.password_hash, u.provider,
     u.google_id, u.profile_picture_url, u.role_id, r.name AS role_name, u.is_active,
     u.created_at, u.updated_at";

/// SQLite-backed user store
#[derive(Clone)]
pub struct SqliteUserStore {
    db: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn row_to_user(row: &SqliteRow) -> UserAccount {
        let provider: String = row.get("provider");
        UserAccount {
            id: row.get("id"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            password_hash: row.get("password_hash"),
            provider: Provider::parse(&provider),
            google_id: row.get("google_id"),
            profile_picture_url: row.get("profile_picture_url"),
            role_id: row.get("role_id"),
            role_name: row.get("role_name"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    async fn fetch_one_where(&self, clause: &str, value: String) -> AuthResult<Option<UserAccount>> {
        let sql = format!(
            "SELECT {} FROM users u JOIN roles r ON r.id = u.role_id WHERE {}",
            USER_COLUMNS, clause
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.as_ref().map(Self::row_to_user))
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<UserAccount>> {
        self.fetch_one_where("u.email = ?1 COLLATE NOCASE", normalize_email(email))
            .await
    }

    async fn find_user_by_id(&self, id: i64) -> AuthResult<Option<UserAccount>> {
        let sql = format!(
            "SELECT {} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = ?1",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> AuthResult<Option<UserAccount>> {
        self.fetch_one_where("u.google_id = ?1", external_id.to_string())
            .await
    }

    async fn create_user(&self, user: NewUser) -> AuthResult<UserAccount> {
        let now = Utc::now();
        let email = normalize_email(&user.email);

        let result = sqlx::query(
            "INSERT INTO users (first_name, last_name, email, password_hash, provider, google_id,
                                profile_picture_url, role_id, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(user.provider.as_str())
        .bind(&user.google_id)
        .bind(&user.profile_picture_url)
        .bind(user.role_id)
        .bind(true)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AuthError::EmailAlreadyRegistered;
                }
            }
            AuthError::Database(e)
        })?;

        let id = result.last_insert_rowid();
        debug!(user_id = id, provider = %user.provider, "created user");

        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| AuthError::Internal("Inserted user not found".to_string()))
    }

    async fn update_user(&self, user: &UserAccount) -> AuthResult<UserAccount> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE users SET first_name = ?1, last_name = ?2, password_hash = ?3, provider = ?4,
                              google_id = ?5, profile_picture_url = ?6, role_id = ?7,
                              is_active = ?8, updated_at = ?9
             WHERE id = ?10",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.provider.as_str())
        .bind(&user.google_id)
        .bind(&user.profile_picture_url)
        .bind(user.role_id)
        .bind(user.is_active)
        .bind(now)
        .bind(user.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserInvalid);
        }

        self.find_user_by_id(user.id)
            .await?
            .ok_or(AuthError::UserInvalid)
    }

    async fn find_role_by_id(&self, id: i64) -> AuthResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_active FROM roles WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(role)
    }
}
