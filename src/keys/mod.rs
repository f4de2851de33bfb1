//! Signing key material: one current key for signing, retired keys for verification.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use parking_lot::RwLock;
use std::fmt;
use tracing::{debug, info, warn};

/// A single key, identified in token headers by `kid`.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    /// Unix seconds after which the key no longer verifies. `None` for the current key.
    expires_at: Option<i64>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn hmac(kid: impl Into<String>, algorithm: Algorithm, secret: &[u8]) -> AuthResult<Self> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::Config(format!(
                "{:?} is not an HMAC algorithm",
                algorithm
            )));
        }
        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expires_at: None,
        })
    }

    /// Asymmetric key pair from PEM-encoded private and public keys.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: Algorithm,
        private_pem: &[u8],
        public_pem: &[u8],
    ) -> AuthResult<Self> {
        let pem_err = |e: jsonwebtoken::errors::Error| AuthError::Config(format!("PEM key: {}", e));
        let (encoding, decoding) = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (
                EncodingKey::from_rsa_pem(private_pem).map_err(pem_err)?,
                DecodingKey::from_rsa_pem(public_pem).map_err(pem_err)?,
            ),
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(private_pem).map_err(pem_err)?,
                DecodingKey::from_ec_pem(public_pem).map_err(pem_err)?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(private_pem).map_err(pem_err)?,
                DecodingKey::from_ed_pem(public_pem).map_err(pem_err)?,
            ),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(AuthError::Config(
                    "HMAC keys are built from a secret, not PEM".to_string(),
                ))
            }
        };
        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding,
            decoding,
            expires_at: None,
        })
    }

    /// Marks the key as verify-only until `at` (Unix seconds).
    pub fn expiring_at(mut self, at: i64) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    fn is_live(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |exp| now < exp)
    }

    /// Signs `message`, returning the base64url signature segment.
    pub fn sign(&self, message: &[u8]) -> AuthResult<String> {
        crypto::sign(message, &self.encoding, self.algorithm).map_err(|e| {
            debug!(kid = %self.kid, error = %e, "signing failed");
            AuthError::Signing(e.to_string())
        })
    }

    fn verify(&self, message: &[u8], signature: &str) -> bool {
        crypto::verify(signature, message, &self.decoding, self.algorithm).unwrap_or(false)
    }
}

/// `now + grace` in Unix seconds, saturating instead of overflowing.
fn retire_at(now: DateTime<Utc>, grace: Duration) -> i64 {
    now.checked_add_signed(grace)
        .map_or(i64::MAX, |at| at.timestamp())
}

#[derive(Default)]
struct KeyRing {
    current: Option<SigningKey>,
    previous: Vec<SigningKey>,
}

/// Holds the active key plus retired keys that still verify.
/// Read-mostly; rotation takes the write lock.
#[derive(Default)]
pub struct KeyStore {
    ring: RwLock<KeyRing>,
}

impl KeyStore {
    pub fn new(current: SigningKey) -> Self {
        Self {
            ring: RwLock::new(KeyRing {
                current: Some(current),
                previous: Vec::new(),
            }),
        }
    }

    /// A store with no keys; signing and verifying fail with `KeyUnavailable`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a retired key. Give it an expiry via `SigningKey::expiring_at`.
    pub fn with_previous(self, key: SigningKey) -> Self {
        self.ring.write().previous.push(key);
        self
    }

    /// Builds the store described by the config. Retired secrets stay valid
    /// for `previous_key_ttl` from `now`.
    pub fn from_config(config: &AuthConfig, now: DateTime<Utc>) -> AuthResult<Self> {
        let current = if config.is_hmac() {
            match &config.jwt_secret {
                Some(secret) => Some(SigningKey::hmac(
                    config.key_id.clone(),
                    config.algorithm,
                    secret.as_bytes(),
                )?),
                None => None,
            }
        } else {
            match (&config.private_key_path, &config.public_key_path) {
                (Some(private), Some(public)) => {
                    let read = |p: &std::path::Path| {
                        std::fs::read(p).map_err(|e| {
                            AuthError::Config(format!("read {}: {}", p.display(), e))
                        })
                    };
                    Some(SigningKey::from_pem(
                        config.key_id.clone(),
                        config.algorithm,
                        &read(private.as_path())?,
                        &read(public.as_path())?,
                    )?)
                }
                (None, None) => None,
                _ => {
                    return Err(AuthError::Config(
                        "JWT_PRIVATE_KEY_PATH and JWT_PUBLIC_KEY_PATH must be set together"
                            .to_string(),
                    ))
                }
            }
        };
        if !config.is_hmac() && (config.jwt_secret.is_some() || !config.previous_secrets.is_empty()) {
            warn!(algorithm = ?config.algorithm, "JWT_SECRET / JWT_PREVIOUS_SECRETS ignored for asymmetric algorithm");
        }

        let retire_at = retire_at(now, config.previous_key_ttl);
        let mut previous = Vec::with_capacity(config.previous_secrets.len());
        if config.is_hmac() {
            for (kid, secret) in &config.previous_secrets {
                previous.push(
                    SigningKey::hmac(kid.clone(), config.algorithm, secret.as_bytes())?
                        .expiring_at(retire_at),
                );
            }
        }

        Ok(Self {
            ring: RwLock::new(KeyRing { current, previous }),
        })
    }

    /// Snapshot of the key new tokens are signed with.
    pub fn signing_key(&self) -> AuthResult<SigningKey> {
        self.ring
            .read()
            .current
            .clone()
            .ok_or(AuthError::KeyUnavailable)
    }

    /// Checks `signature` over `message` against the current key and every
    /// retired key still live at `now`. When `kid` is given only keys with
    /// that id are tried. The token's algorithm must match the key's.
    pub fn verify(
        &self,
        kid: Option<&str>,
        algorithm: Algorithm,
        message: &[u8],
        signature: &str,
        now: i64,
    ) -> AuthResult<bool> {
        let ring = self.ring.read();
        if ring.current.is_none() && ring.previous.is_empty() {
            return Err(AuthError::KeyUnavailable);
        }
        let accepted = ring
            .current
            .iter()
            .chain(ring.previous.iter().filter(|k| k.is_live(now)))
            .filter(|k| kid.map_or(true, |kid| k.kid == kid))
            .filter(|k| k.algorithm == algorithm)
            .any(|k| k.verify(message, signature));
        Ok(accepted)
    }

    /// Installs `key` as the signing key. The old current key keeps verifying
    /// for `grace`; retired keys already past their expiry are dropped.
    pub fn rotate(&self, key: SigningKey, now: DateTime<Utc>, grace: Duration) {
        let retire_at = retire_at(now, grace);
        let mut ring = self.ring.write();
        let new_kid = key.kid.clone();
        if let Some(old) = ring.current.replace(key) {
            info!(old_kid = %old.kid, new_kid = %new_kid, retire_at, "signing key rotated");
            ring.previous.push(old.expiring_at(retire_at));
        } else {
            info!(new_kid = %new_kid, "signing key installed");
        }
        let now = now.timestamp();
        ring.previous.retain(|k| k.is_live(now));
    }

    pub fn previous_kids(&self) -> Vec<String> {
        self.ring.read().previous.iter().map(|k| k.kid.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_A: &[u8] = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const SECRET_B: &[u8] = b"bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn key(kid: &str, secret: &[u8]) -> SigningKey {
        SigningKey::hmac(kid, Algorithm::HS256, secret).unwrap()
    }

    #[test]
    fn sign_then_verify_with_current_key() {
        let store = KeyStore::new(key("a", SECRET_A));
        let sig = store.signing_key().unwrap().sign(b"payload").unwrap();
        assert!(store
            .verify(Some("a"), Algorithm::HS256, b"payload", &sig, 0)
            .unwrap());
        assert!(!store
            .verify(Some("a"), Algorithm::HS256, b"payload2", &sig, 0)
            .unwrap());
    }

    #[test]
    fn empty_store_is_unavailable() {
        let store = KeyStore::empty();
        assert_eq!(store.signing_key().unwrap_err(), AuthError::KeyUnavailable);
        assert_eq!(
            store
                .verify(None, Algorithm::HS256, b"x", "sig", 0)
                .unwrap_err(),
            AuthError::KeyUnavailable
        );
    }

    #[test]
    fn rejects_algorithm_and_kid_mismatch() {
        let store = KeyStore::new(key("a", SECRET_A));
        let sig = store.signing_key().unwrap().sign(b"m").unwrap();
        assert!(!store.verify(Some("a"), Algorithm::HS512, b"m", &sig, 0).unwrap());
        assert!(!store.verify(Some("other"), Algorithm::HS256, b"m", &sig, 0).unwrap());
        assert!(store.verify(None, Algorithm::HS256, b"m", &sig, 0).unwrap());
    }

    #[test]
    fn previous_key_verifies_until_expiry() {
        let old = key("old", SECRET_B);
        let sig = old.sign(b"m").unwrap();
        let store = KeyStore::new(key("new", SECRET_A)).with_previous(old.expiring_at(100));
        assert!(store.verify(Some("old"), Algorithm::HS256, b"m", &sig, 99).unwrap());
        assert!(!store.verify(Some("old"), Algorithm::HS256, b"m", &sig, 100).unwrap());
    }

    #[test]
    fn rotation_signs_with_new_key_and_keeps_old_for_grace() {
        let store = KeyStore::new(key("a", SECRET_A));
        let old_sig = store.signing_key().unwrap().sign(b"m").unwrap();
        let now = Utc::now();
        store.rotate(key("b", SECRET_B), now, Duration::minutes(5));

        assert_eq!(store.signing_key().unwrap().kid(), "b");
        assert_eq!(store.previous_kids(), vec!["a".to_string()]);
        let t = now.timestamp();
        assert!(store.verify(Some("a"), Algorithm::HS256, b"m", &old_sig, t).unwrap());
        assert!(!store
            .verify(Some("a"), Algorithm::HS256, b"m", &old_sig, t + 301)
            .unwrap());

        store.rotate(key("c", SECRET_A), now + Duration::minutes(10), Duration::minutes(5));
        assert_eq!(store.previous_kids(), vec!["b".to_string()]);
    }

    #[test]
    fn rotation_with_unrepresentable_grace_keeps_old_key() {
        let store = KeyStore::new(key("a", SECRET_A));
        let old_sig = store.signing_key().unwrap().sign(b"m").unwrap();
        store.rotate(key("b", SECRET_B), Utc::now(), Duration::MAX);
        assert!(store
            .verify(Some("a"), Algorithm::HS256, b"m", &old_sig, i64::MAX - 1)
            .unwrap());
    }

    #[test]
    fn signing_failure_is_not_reported_as_missing_key() {
        let mismatched = SigningKey {
            kid: "k".to_string(),
            algorithm: Algorithm::RS256,
            encoding: EncodingKey::from_secret(SECRET_A),
            decoding: DecodingKey::from_secret(SECRET_A),
            expires_at: None,
        };
        assert!(matches!(mismatched.sign(b"m"), Err(AuthError::Signing(_))));
    }

    fn config(vars: &[(&str, &str)]) -> AuthConfig {
        let vars: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuthConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[test]
    fn lone_pem_path_is_a_config_error() {
        for var in ["JWT_PRIVATE_KEY_PATH", "JWT_PUBLIC_KEY_PATH"] {
            let config = config(&[("JWT_ALGORITHM", "RS256"), (var, "/nonexistent/key.pem")]);
            assert!(
                matches!(KeyStore::from_config(&config, Utc::now()), Err(AuthError::Config(_))),
                "{} alone should be rejected",
                var
            );
        }
    }

    #[test]
    fn asymmetric_config_without_pem_pair_is_empty() {
        let config = config(&[("JWT_ALGORITHM", "ES256")]);
        let store = KeyStore::from_config(&config, Utc::now()).unwrap();
        assert_eq!(store.signing_key().unwrap_err(), AuthError::KeyUnavailable);
    }

    #[test]
    fn hmac_constructor_rejects_asymmetric_algorithms() {
        assert!(matches!(
            SigningKey::hmac("k", Algorithm::RS256, SECRET_A),
            Err(AuthError::Config(_))
        ));
    }
}
