//! Error kinds surfaced by the token core, and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Token lifecycle errors. Each kind is preserved up to the caller so it can
/// tell "refresh" apart from "re-authenticate" apart from "bad request".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No signing key configured")]
    KeyUnavailable,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token not provided")]
    MissingToken,

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        AuthError::MalformedToken(reason.into())
    }

    /// Stable machine-readable kind, sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::KeyUnavailable => "key_unavailable",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Signing(_) => "signing_failed",
            AuthError::Config(_) => "config",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MalformedToken(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::MissingToken
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::KeyUnavailable | AuthError::Signing(_) | AuthError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
        (self.status(), body).into_response()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
