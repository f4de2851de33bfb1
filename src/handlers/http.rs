//! HTTP handlers for the token endpoints: login, refresh, logout, me.
//!
//! Mount them on whatever router the embedding service uses; the router
//! state must provide an `AuthService` (and, for `login`, an
//! `Arc<dyn CredentialVerifier>`) via `FromRef`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::auth::{AuthService, CredentialVerifier, IssuedToken};
use crate::error::AuthError;
use crate::middleware::{AuthUser, BearerToken};

const TOKEN_TYPE: &str = "bearer";

/// Body returned whenever a token is handed out.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            expires_in: issued.expires_in(),
            access_token: issued.token,
            token_type: TOKEN_TYPE,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject_id: String,
    pub roles: BTreeSet<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /user/login
pub async fn login(
    State(auth): State<AuthService>,
    State(credentials): State<Arc<dyn CredentialVerifier>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let identity = credentials
        .verify(&body.email, &body.password)
        .await
        .map_err(|e| {
            debug!(login = %body.email, error = %e, "login rejected");
            e
        })?;
    let issued = auth.issue(&identity)?;
    Ok(Json(issued.into()))
}

/// POST /auth/token/refresh
pub async fn refresh_token(
    State(auth): State<AuthService>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenResponse>, AuthError> {
    let issued = auth.refresh(&token)?;
    Ok(Json(issued.into()))
}

/// POST /auth/logout
pub async fn logout(
    State(auth): State<AuthService>,
    BearerToken(token): BearerToken,
) -> Result<Json<serde_json::Value>, AuthError> {
    auth.logout(&token)?;
    Ok(Json(json!({
        "status": 200,
        "message": "user logged out successfully"
    })))
}

/// POST /auth/me — identity snapshot taken at login; roles are not re-read.
pub async fn me(AuthUser(claims): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        subject_id: claims.subject_id,
        roles: claims.roles,
        issued_at: claims.issued_at,
        expires_at: claims.expires_at,
    })
}
