//! Credential check performed by the embedding application before issuance.

use async_trait::async_trait;

use crate::claims::Identity;
use crate::error::AuthResult;

/// Resolves a login/password pair to an identity. Password hashing and user
/// storage live behind this trait, outside the token core.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns `AuthError::InvalidCredentials` when the pair does not match.
    async fn verify(&self, login: &str, password: &str) -> AuthResult<Identity>;
}
