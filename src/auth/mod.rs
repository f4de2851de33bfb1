//! Token lifecycle: issue, verify, refresh, logout.

mod credentials;
mod issuer;
mod service;
mod verifier;

pub use credentials::CredentialVerifier;
pub use issuer::{IssuedToken, TokenIssuer};
pub use service::AuthService;
pub use verifier::TokenVerifier;
