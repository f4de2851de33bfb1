//! Token lifecycle service: issue, verify, refresh, logout.

use crate::auth::{IssuedToken, TokenIssuer, TokenVerifier};
use crate::claims::{Claims, Identity};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::keys::{KeyStore, SigningKey};
use crate::revocation::{spawn_sweeper, RevocationRegistry};
use chrono::Duration;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Cheap to clone; every clone shares keys, revocations and clock.
#[derive(Clone)]
pub struct AuthService {
    issuer: Arc<TokenIssuer>,
    verifier: Arc<TokenVerifier>,
    keys: Arc<KeyStore>,
    registry: Arc<RevocationRegistry>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    refresh_ttl: Option<Duration>,
    sweep_interval: std::time::Duration,
    /// Longest token lifetime handed out so far, in seconds.
    longest_lifetime: Arc<AtomicI64>,
}

const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

impl AuthService {
    pub fn new(
        keys: Arc<KeyStore>,
        registry: Arc<RevocationRegistry>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            issuer: Arc::new(TokenIssuer::new(keys.clone(), clock.clone())),
            verifier: Arc::new(TokenVerifier::new(
                keys.clone(),
                registry.clone(),
                clock.clone(),
            )),
            keys,
            registry,
            clock,
            longest_lifetime: Arc::new(AtomicI64::new(ttl.num_seconds())),
            ttl,
            refresh_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Lets expired tokens be refreshed while `now < iat + window`.
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_ttl = Some(window);
        self
    }

    pub fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let keys = Arc::new(KeyStore::from_config(config, clock.now())?);
        let mut service = Self::new(keys, Arc::new(RevocationRegistry::new()), clock, config.ttl);
        service.refresh_ttl = config.refresh_ttl;
        service.sweep_interval = config.sweep_interval;
        Ok(service)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn registry(&self) -> &Arc<RevocationRegistry> {
        &self.registry
    }

    /// Issues a token with the configured TTL.
    pub fn issue(&self, identity: &Identity) -> AuthResult<IssuedToken> {
        self.issuer.issue(identity, self.ttl)
    }

    pub fn issue_with_ttl(&self, identity: &Identity, ttl: Duration) -> AuthResult<IssuedToken> {
        let issued = self.issuer.issue(identity, ttl)?;
        self.longest_lifetime
            .fetch_max(issued.claims.lifetime_secs(), Ordering::Relaxed);
        Ok(issued)
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verifier.verify(token)
    }

    /// Exchanges a valid token for a new one with the same identity and
    /// lifetime. The old token is revoked; of two concurrent refreshes of the
    /// same token only one succeeds, the other gets `TokenRevoked`.
    #[instrument(skip(self, token))]
    pub fn refresh(&self, token: &str) -> AuthResult<IssuedToken> {
        let old = self.verify_refreshable(token)?;
        let ttl = match old.lifetime_secs() {
            secs if secs > 0 => Duration::seconds(secs),
            _ => self.ttl,
        };
        let fresh = self.issue_with_ttl(&old.identity(), ttl)?;
        if !self.registry.revoke(&old.token_id, self.revocation_deadline(&old)) {
            return Err(AuthError::TokenRevoked);
        }
        info!(sub = %old.subject_id, old_jti = %old.token_id, new_jti = %fresh.claims.token_id, "token refreshed");
        Ok(fresh)
    }

    /// Revokes `token`. Tokens that fail verification are reported, not revoked.
    #[instrument(skip(self, token))]
    pub fn logout(&self, token: &str) -> AuthResult<()> {
        let claims = self.verify_refreshable(token)?;
        self.registry
            .revoke(&claims.token_id, self.revocation_deadline(&claims));
        info!(sub = %claims.subject_id, jti = %claims.token_id, "token revoked on logout");
        Ok(())
    }

    /// Installs a new signing key. The previous key keeps verifying for as
    /// long as any token it signed could still be used or refreshed.
    pub fn rotate_key(&self, key: SigningKey) {
        let longest = self.longest_lifetime.load(Ordering::Relaxed).max(0);
        let mut grace = Duration::try_seconds(longest).unwrap_or(Duration::MAX);
        if let Some(window) = self.refresh_ttl {
            grace = grace.max(window);
        }
        self.keys.rotate(key, self.clock.now(), grace.max(self.ttl));
    }

    /// Starts periodic removal of expired revocation entries, every
    /// `sweep_interval` (`REVOCATION_SWEEP_INTERVAL` when built from config).
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            self.registry.clone(),
            self.clock.clone(),
            self.sweep_interval,
        )
    }

    /// Full verification, except that with a refresh window an expired token
    /// is still accepted until `iat + window`.
    fn verify_refreshable(&self, token: &str) -> AuthResult<Claims> {
        match (self.verifier.verify(token), self.refresh_ttl) {
            (Err(AuthError::TokenExpired), Some(window)) => {
                let claims = self.verifier.verify_signature(token)?;
                if self.clock.timestamp() >= claims.issued_at.saturating_add(window.num_seconds()) {
                    return Err(AuthError::TokenExpired);
                }
                if self.registry.is_revoked(&claims.token_id) {
                    return Err(AuthError::TokenRevoked);
                }
                Ok(claims)
            }
            (result, _) => result,
        }
    }

    /// A revoked token must stay rejected as long as it could otherwise be
    /// verified or refreshed.
    fn revocation_deadline(&self, claims: &Claims) -> i64 {
        match self.refresh_ttl {
            Some(window) => claims
                .expires_at
                .max(claims.issued_at.saturating_add(window.num_seconds())),
            None => claims.expires_at,
        }
    }
}
