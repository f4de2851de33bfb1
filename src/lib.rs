//! Stateless JWT issuance, verification, refresh and revocation.
//!
//! Tokens are signed `header.payload.signature` strings verifiable offline;
//! logout and refresh revoke the token id in an in-memory registry that only
//! keeps entries until the token would have expired on its own.

pub mod auth;
pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod middleware;
pub mod revocation;

pub use auth::{AuthService, CredentialVerifier, IssuedToken, TokenIssuer, TokenVerifier};
pub use claims::{Claims, ClaimsCodec, Identity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use keys::{KeyStore, SigningKey};
pub use revocation::{RevocationEntry, RevocationRegistry};
