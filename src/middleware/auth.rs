//! Extractors: raw bearer token, and verified claims.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::auth::AuthService;
use crate::claims::Claims;
use crate::error::AuthError;

const BEARER: &str = "bearer";

/// Token from `Authorization: Bearer <token>`, not yet verified.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

impl BearerToken {
    fn from_parts(parts: &Parts) -> Result<Self, AuthError> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;
        match value.trim().split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case(BEARER) && !token.trim().is_empty() => {
                Ok(BearerToken(token.trim().to_string()))
            }
            _ => {
                debug!("rejected request: Authorization header is not a bearer token");
                Err(AuthError::MissingToken)
            }
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        BearerToken::from_parts(parts)
    }
}

/// Extractor: claims of a fully verified bearer token.
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_parts(parts)?;
        let claims = AuthService::from_ref(state).verify(&token)?;
        Ok(AuthUser(claims))
    }
}
