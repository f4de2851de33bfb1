//! Identity, claims, and their wire encoding.

mod codec;

pub use codec::{ClaimsCodec, TokenHeader, SCHEMA_VERSION};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Authenticated principal, as handed over by the credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: String,
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn new<I, R>(subject_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            subject_id: subject_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Payload of a token. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: String,
    pub roles: BTreeSet<String>,
    pub token_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.subject_id.clone(),
            roles: self.roles.clone(),
        }
    }

    /// Seconds between issuance and expiry.
    pub fn lifetime_secs(&self) -> i64 {
        self.expires_at - self.issued_at
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.issued_at, 0).single()
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }
}
