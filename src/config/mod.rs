//! Token configuration loaded from environment.

use chrono::Duration;
use jsonwebtoken::Algorithm;
use std::path::PathBuf;
use std::str::FromStr;

const MIN_SECRET_LEN: usize = 32;

/// Token configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Signing algorithm (`JWT_ALGORITHM`, default `HS256`).
    pub algorithm: Algorithm,
    /// HMAC signing secret (min 32 chars). `None` leaves the key store empty.
    pub jwt_secret: Option<String>,
    /// PEM private key for asymmetric algorithms.
    pub private_key_path: Option<PathBuf>,
    /// PEM public key for asymmetric algorithms.
    pub public_key_path: Option<PathBuf>,
    /// `kid` stamped in the header of every issued token.
    pub key_id: String,
    /// Retired HMAC keys still accepted for verification, as `(kid, secret)`.
    pub previous_secrets: Vec<(String, String)>,
    /// How long a retired key keeps verifying after load or rotation.
    pub previous_key_ttl: Duration,
    /// Lifetime of issued tokens.
    pub ttl: Duration,
    /// Window from `iat` in which an expired token may still be refreshed.
    pub refresh_ttl: Option<Duration>,
    /// Period of the revocation sweeper.
    pub sweep_interval: std::time::Duration,
}

impl AuthConfig {
    /// Load `.env` (if present), then read the environment.
    pub fn load() -> Result<Self, ConfigLoadError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any variable source; `from_env` uses the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let algorithm = match lookup("JWT_ALGORITHM") {
            Some(raw) => Algorithm::from_str(raw.trim())
                .map_err(|_| ConfigLoadError::InvalidAlgorithm(raw))?,
            None => Algorithm::HS256,
        };

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty());
        if let Some(secret) = &jwt_secret {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigLoadError::WeakSecret("JWT_SECRET"));
            }
        }

        let private_key_path = lookup("JWT_PRIVATE_KEY_PATH").map(PathBuf::from);
        let public_key_path = lookup("JWT_PUBLIC_KEY_PATH").map(PathBuf::from);
        let key_id = lookup("JWT_KEY_ID").unwrap_or_else(|| "primary".to_string());

        let previous_secrets = match lookup("JWT_PREVIOUS_SECRETS") {
            Some(raw) => parse_previous_secrets(&raw)?,
            None => Vec::new(),
        };

        let ttl = parse_duration(&lookup, "JWT_TTL", 60, Duration::try_minutes)?
            .unwrap_or(Duration::minutes(60));
        let refresh_ttl = parse_duration(&lookup, "JWT_REFRESH_TTL", 0, Duration::try_minutes)?;
        let previous_key_ttl =
            parse_duration(&lookup, "JWT_PREVIOUS_KEY_TTL", 0, Duration::try_seconds)?
                .unwrap_or(ttl);
        let sweep_interval = std::time::Duration::from_secs(
            parse_positive(&lookup, "REVOCATION_SWEEP_INTERVAL", 60)? as u64,
        );

        Ok(Self {
            algorithm,
            jwt_secret,
            private_key_path,
            public_key_path,
            key_id,
            previous_secrets,
            previous_key_ttl,
            ttl,
            refresh_ttl,
            sweep_interval,
        })
    }

    pub fn is_hmac(&self) -> bool {
        matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        )
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str, default: i64) -> Result<i64, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(ConfigLoadError::InvalidNumber(name)),
        },
        None => Ok(default),
    }
}

/// `None` when the variable is unset; values chrono cannot represent are
/// rejected like any other bad number.
fn parse_duration<F>(
    lookup: &F,
    name: &'static str,
    default: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Option<Duration>, ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(name).is_none() {
        return Ok(None);
    }
    let value = parse_positive(lookup, name, default)?;
    unit(value)
        .map(Some)
        .ok_or(ConfigLoadError::InvalidNumber(name))
}

/// `kid=secret;kid=secret`
fn parse_previous_secrets(raw: &str) -> Result<Vec<(String, String)>, ConfigLoadError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (kid, secret) = pair
                .split_once('=')
                .ok_or(ConfigLoadError::InvalidPreviousSecrets)?;
            let (kid, secret) = (kid.trim(), secret.trim());
            if kid.is_empty() {
                return Err(ConfigLoadError::InvalidPreviousSecrets);
            }
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigLoadError::WeakSecret("JWT_PREVIOUS_SECRETS"));
            }
            Ok((kid.to_string(), secret.to_string()))
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid JWT_ALGORITHM: {0}")]
    InvalidAlgorithm(String),
    #[error("{0} must be at least 32 characters")]
    WeakSecret(&'static str),
    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),
    #[error("Invalid JWT_PREVIOUS_SECRETS (expected kid=secret;kid=secret)")]
    InvalidPreviousSecrets,
}
