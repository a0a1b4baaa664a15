//! Bearer tokens.
//!
//! Compact JWS with `HS256`: `base64url(header) "." base64url(claims) "."
//! base64url(HMAC-SHA256(key, header "." claims))`. Claims are parsed into
//! a typed [`Claims`] once, at verification.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use parkspot_core::{AccountType, UserId};

use crate::config::TokenConfig;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Errors from issuing or verifying a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("token lifetime out of range")]
    LifetimeOutOfRange,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token signing key rejected")]
    InvalidKey,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// What a verified token says about its bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub account_type: AccountType,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Signing key and lifetime for bearer tokens.
#[derive(Clone)]
pub struct TokenKeys {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenKeys {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    #[must_use]
    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.secret.clone(), config.ttl)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::InvalidKey)
    }

    /// Issue a token for `user` valid from `now` for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidKey` if the key cannot be used for HMAC,
    /// and `TokenError::LifetimeOutOfRange` if `now` plus the lifetime is not
    /// a representable instant.
    pub fn issue(
        &self,
        user: UserId,
        account_type: AccountType,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::LifetimeOutOfRange)?;
        let claims = Claims {
            sub: user,
            account_type,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };

        let header = serde_json::to_vec(&header).map_err(|_| TokenError::Malformed)?;
        let claims = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token's signature and expiry at `now`.
    ///
    /// # Errors
    ///
    /// Returns the matching `TokenError` if the token is not three base64url
    /// segments, names an algorithm other than `HS256`, fails the signature
    /// check, lacks a required claim, or has `exp <= now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_segment(claims_b64)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(
            SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            Duration::hours(24),
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let token = keys()
            .issue(UserId::new(42), AccountType::Admin, t0())
            .unwrap();
        let claims = keys().verify(&token, t0() + Duration::hours(1)).unwrap();

        assert_eq!(claims.sub, UserId::new(42));
        assert_eq!(claims.account_type, AccountType::Admin);
        assert_eq!(claims.iat, t0().timestamp());
        assert_eq!(claims.exp, (t0() + Duration::hours(24)).timestamp());
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let keys = TokenKeys::new(
            SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%"),
            Duration::hours(10_000_000_000),
        );
        assert_eq!(
            keys.issue(UserId::new(1), AccountType::User, t0()),
            Err(TokenError::LifetimeOutOfRange)
        );
    }

    #[test]
    fn test_expired_at_exp_instant() {
        let token = keys().issue(UserId::new(1), AccountType::User, t0()).unwrap();
        assert_eq!(
            keys().verify(&token, t0() + Duration::hours(24)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = keys().issue(UserId::new(1), AccountType::User, t0()).unwrap();
        let other = TokenKeys::new(
            SecretString::from("Zz9!Yy8@Xx7#Ww6$Vv5%Uu4^Tt3&Ss2*"),
            Duration::hours(24),
        );
        assert_eq!(other.verify(&token, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let token = keys().issue(UserId::new(1), AccountType::User, t0()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: UserId::new(1),
                account_type: AccountType::Admin,
                iat: t0().timestamp(),
                exp: (t0() + Duration::hours(24)).timestamp(),
            })
            .unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        assert_eq!(keys().verify(&forged, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_alg_none_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":1,"account_type":"admin","iat":0,"exp":9999999999}"#);
        let token = format!("{header}.{claims}.");

        assert_eq!(
            keys().verify(&token, t0()),
            Err(TokenError::UnsupportedAlgorithm)
        );
    }

    #[test]
    fn test_malformed_rejected() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(keys().verify(token, t0()), Err(TokenError::Malformed), "{token}");
        }
    }
}
