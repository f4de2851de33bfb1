//! Claims and header segments: JSON with fixed field names, base64url without padding.

use super::Claims;
use crate::error::{AuthError, AuthResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bumped whenever the claim layout changes; older tokens are then rejected.
pub const SCHEMA_VERSION: u32 = 1;

const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    ver: u32,
    sub: String,
    roles: BTreeSet<String>,
    jti: String,
    iat: i64,
    exp: i64,
}

/// First token segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: Algorithm,
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl TokenHeader {
    pub fn new(alg: Algorithm, kid: impl Into<String>) -> Self {
        Self {
            alg,
            typ: TOKEN_TYPE.to_string(),
            kid: Some(kid.into()),
        }
    }
}

pub struct ClaimsCodec;

impl ClaimsCodec {
    pub fn encode(claims: &Claims) -> AuthResult<String> {
        let wire = WireClaims {
            ver: SCHEMA_VERSION,
            sub: claims.subject_id.clone(),
            roles: claims.roles.clone(),
            jti: claims.token_id.clone(),
            iat: claims.issued_at,
            exp: claims.expires_at,
        };
        encode_segment(&wire)
    }

    pub fn decode(segment: &str) -> AuthResult<Claims> {
        let wire: WireClaims = decode_segment(segment, "claims")?;
        if wire.ver != SCHEMA_VERSION {
            return Err(AuthError::malformed(format!(
                "unsupported claims version {}",
                wire.ver
            )));
        }
        if wire.jti.is_empty() {
            return Err(AuthError::malformed("empty jti"));
        }
        Ok(Claims {
            subject_id: wire.sub,
            roles: wire.roles,
            token_id: wire.jti,
            issued_at: wire.iat,
            expires_at: wire.exp,
        })
    }

    pub fn encode_header(header: &TokenHeader) -> AuthResult<String> {
        encode_segment(header)
    }

    pub fn decode_header(segment: &str) -> AuthResult<TokenHeader> {
        let header: TokenHeader = decode_segment(segment, "header")?;
        if header.typ != TOKEN_TYPE {
            return Err(AuthError::malformed(format!("unexpected typ {}", header.typ)));
        }
        Ok(header)
    }
}

fn encode_segment<T: Serialize>(value: &T) -> AuthResult<String> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> AuthResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::malformed(format!("{} is not base64url: {}", what, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::malformed(format!("{}: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Claims {
        Claims {
            subject_id: "u1".to_string(),
            roles: ["admin", "editor"].iter().map(|r| r.to_string()).collect(),
            token_id: "3f1c".to_string(),
            issued_at: 1_700_000_000,
            expires_at: 1_700_003_600,
        }
    }

    #[test]
    fn decode_inverts_encode() {
        let claims = sample();
        let encoded = ClaimsCodec::encode(&claims).unwrap();
        assert_eq!(ClaimsCodec::decode(&encoded).unwrap(), claims);
    }

    #[test]
    fn encoding_is_deterministic_regardless_of_role_order() {
        let mut a = sample();
        a.roles = ["b", "a"].iter().map(|r| r.to_string()).collect();
        let mut b = sample();
        b.roles = ["a", "b"].iter().map(|r| r.to_string()).collect();
        assert_eq!(
            ClaimsCodec::encode(&a).unwrap(),
            ClaimsCodec::encode(&b).unwrap()
        );
    }

    #[test]
    fn missing_field_is_malformed() {
        let segment = URL_SAFE_NO_PAD.encode(r#"{"ver":1,"sub":"u1","roles":[],"iat":1,"exp":2}"#);
        assert!(matches!(
            ClaimsCodec::decode(&segment),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn version_mismatch_is_malformed() {
        let segment = URL_SAFE_NO_PAD
            .encode(r#"{"ver":2,"sub":"u1","roles":[],"jti":"x","iat":1,"exp":2}"#);
        let err = ClaimsCodec::decode(&segment).unwrap_err();
        assert_eq!(err, AuthError::malformed("unsupported claims version 2"));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            ClaimsCodec::decode("!!not base64!!"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            ClaimsCodec::decode(&URL_SAFE_NO_PAD.encode("[1,2]")),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn header_round_trip_and_typ_check() {
        let header = TokenHeader::new(Algorithm::HS256, "primary");
        let encoded = ClaimsCodec::encode_header(&header).unwrap();
        assert_eq!(ClaimsCodec::decode_header(&encoded).unwrap(), header);

        let other = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWE"}"#);
        assert!(ClaimsCodec::decode_header(&other).is_err());
    }
}
