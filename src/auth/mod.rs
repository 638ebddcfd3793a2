/// Two-factor authentication and session lifecycle
///
/// Credentials are checked by `CredentialVerifier`, a one-time code is sent by
/// `ChallengeIssuer`, and `TokenIssuer` mints the access/refresh pair once the
/// code is confirmed. `GoogleBridge` is the alternative entry that skips the
/// code. `AuthSessionManager` is the facade over all of them.

pub mod challenge;
pub mod credentials;
pub mod extractor;
pub mod google;
pub mod manager;
pub mod password;
pub mod session;
pub mod tokens;

pub use challenge::{ChallengeIssuer, ChallengeStart, PendingChallenge};
pub use credentials::CredentialVerifier;
pub use extractor::AuthContext;
pub use google::GoogleBridge;
pub use manager::{AuthSessionManager, Registration};
pub use session::{AccessClaims, AuthSession, RefreshSession, TokenIssuer};
