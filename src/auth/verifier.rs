//! Token verification: structure, signature, claims, expiry, revocation.

use crate::claims::{Claims, ClaimsCodec};
use crate::clock::Clock;
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyStore;
use crate::revocation::RevocationRegistry;
use std::sync::Arc;
use tracing::debug;

/// Token segments: `header.payload.signature`.
struct Parts<'a> {
    signing_input: &'a str,
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

fn split(token: &str) -> AuthResult<Parts<'_>> {
    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| AuthError::malformed("expected three segments"))?;
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or_else(|| AuthError::malformed("expected three segments"))?;
    if header.is_empty() || payload.is_empty() || signature.is_empty() || payload.contains('.') {
        return Err(AuthError::malformed("expected three segments"));
    }
    Ok(Parts {
        signing_input,
        header,
        payload,
        signature,
    })
}

pub struct TokenVerifier {
    keys: Arc<KeyStore>,
    registry: Arc<RevocationRegistry>,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn new(
        keys: Arc<KeyStore>,
        registry: Arc<RevocationRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            keys,
            registry,
            clock,
        }
    }

    /// Full check. The first failing stage decides the error kind.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.verify_signature(token)?;
        let now = self.clock.timestamp();
        if claims.is_expired_at(now) {
            debug!(jti = %claims.token_id, exp = claims.expires_at, now, "token expired");
            return Err(AuthError::TokenExpired);
        }
        if self.registry.is_revoked(&claims.token_id) {
            debug!(jti = %claims.token_id, "token revoked");
            return Err(AuthError::TokenRevoked);
        }
        Ok(claims)
    }

    /// Structure, signature and claim decoding only; expiry and revocation
    /// are left to the caller.
    pub fn verify_signature(&self, token: &str) -> AuthResult<Claims> {
        let parts = split(token)?;
        let header = ClaimsCodec::decode_header(parts.header)?;
        let valid = self.keys.verify(
            header.kid.as_deref(),
            header.alg,
            parts.signing_input.as_bytes(),
            parts.signature,
            self.clock.timestamp(),
        )?;
        if !valid {
            debug!(kid = ?header.kid, "token signature rejected");
            return Err(AuthError::InvalidSignature);
        }
        ClaimsCodec::decode(parts.payload)
    }
}
