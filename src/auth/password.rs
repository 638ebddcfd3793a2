/// Password hashing via bcrypt
///
/// bcrypt is CPU-bound, so both operations run on the blocking pool.
use crate::error::{AuthError, AuthResult};

/// Hash a password with bcrypt at the given cost
pub async fn hash_password(password: &str, cost: u32) -> AuthResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("bcrypt task failed: {}", e)))?
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {}", e)))
}

/// Verify a password against a bcrypt hash
pub async fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("bcrypt task failed: {}", e)))?
        .map_err(|e| AuthError::Internal(format!("bcrypt verify: {}", e)))
}
