//! Token issuance.

use crate::claims::{Claims, ClaimsCodec, Identity, TokenHeader};
use crate::clock::Clock;
use crate::error::AuthResult;
use crate::keys::KeyStore;
use chrono::Duration;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    /// Lifetime in seconds, as reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.claims.lifetime_secs()
    }
}

pub struct TokenIssuer {
    keys: Arc<KeyStore>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Signs a new token for `identity` valid for `ttl` from now. Every call
    /// gets its own random `jti`, so identical inputs never yield the same token.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> AuthResult<IssuedToken> {
        let key = self.keys.signing_key()?;
        let now = self.clock.timestamp();
        let claims = Claims {
            subject_id: identity.subject_id.clone(),
            roles: identity.roles.clone(),
            token_id: Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: now.saturating_add(ttl.num_seconds()),
        };

        let header = ClaimsCodec::encode_header(&TokenHeader::new(key.algorithm(), key.kid()))?;
        let payload = ClaimsCodec::encode(&claims)?;
        let signing_input = format!("{}.{}", header, payload);
        let signature = key.sign(signing_input.as_bytes())?;

        info!(sub = %claims.subject_id, jti = %claims.token_id, kid = %key.kid(), exp = claims.expires_at, "token issued");
        Ok(IssuedToken {
            token: format!("{}.{}", signing_input, signature),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::AuthError;
    use crate::keys::SigningKey;
    use jsonwebtoken::Algorithm;

    fn issuer() -> (TokenIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let key = SigningKey::hmac("k1", Algorithm::HS256, b"0123456789abcdef0123456789abcdef")
            .unwrap();
        (
            TokenIssuer::new(Arc::new(KeyStore::new(key)), clock.clone()),
            clock,
        )
    }

    #[test]
    fn stamps_iat_and_exp_from_clock() {
        let (issuer, clock) = issuer();
        let identity = Identity::new("u1", ["admin"]);
        let issued = issuer.issue(&identity, Duration::hours(1)).unwrap();

        assert_eq!(issued.claims.issued_at, clock.timestamp());
        assert_eq!(issued.claims.expires_at, clock.timestamp() + 3600);
        assert_eq!(issued.expires_in(), 3600);
        assert_eq!(issued.claims.identity(), identity);
        assert_eq!(issued.token.split('.').count(), 3);
    }

    #[test]
    fn same_identity_same_instant_gives_distinct_tokens() {
        let (issuer, _clock) = issuer();
        let identity = Identity::new("u1", ["admin"]);
        let a = issuer.issue(&identity, Duration::hours(1)).unwrap();
        let b = issuer.issue(&identity, Duration::hours(1)).unwrap();
        assert_ne!(a.claims.token_id, b.claims.token_id);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn empty_key_store_propagates_key_unavailable() {
        let issuer = TokenIssuer::new(
            Arc::new(KeyStore::empty()),
            Arc::new(ManualClock::default()),
        );
        let err = issuer
            .issue(&Identity::new("u1", Vec::<String>::new()), Duration::hours(1))
            .unwrap_err();
        assert_eq!(err, AuthError::KeyUnavailable);
    }
}
