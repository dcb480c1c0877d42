//! Signed confirmation tokens carried in newsletter e-mail links.
//!
//! A token is `base64url(payload) "." base64url(mac)` where the payload is a
//! small JSON document `{ "email": .., "exp": .. }` and the MAC is
//! HMAC-SHA256 (RFC 2104) over the encoded payload segment. Verification
//! fails closed: anything that is not a well-formed, correctly signed,
//! unexpired token yields `None`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, KeyInit, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

type HmacSha256 = Hmac<Sha256>;

pub const MIN_SECRET_LEN: usize = 32;
pub const MAX_TTL: Duration = Duration::days(365);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenSignerError {
    #[error("signing secret must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,
    #[error("token lifetime must be positive")]
    NonPositiveTtl,
    #[error("token lifetime must not exceed {} days", MAX_TTL.whole_days())]
    TtlTooLong,
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
    #[error("failed to encode token payload: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    email: String,
    exp: i64,
}

/// Issues and verifies e-mail confirmation tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    keyed: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenSignerError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenSignerError::SecretTooShort);
        }
        if !ttl.is_positive() {
            return Err(TokenSignerError::NonPositiveTtl);
        }
        if ttl > MAX_TTL {
            return Err(TokenSignerError::TtlTooLong);
        }

        let keyed = <HmacSha256 as KeyInit>::new_from_slice(secret)
            .map_err(|_| TokenSignerError::SecretTooShort)?;
        Ok(Self { keyed, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `email` with an expiry of `now + ttl`.
    pub fn sign(&self, email: &str, now: OffsetDateTime) -> Result<String, TokenSignerError> {
        let expires_at = now
            .checked_add(self.ttl)
            .ok_or(TokenSignerError::ExpiryOutOfRange)?;
        let payload = TokenPayload {
            email: email.to_string(),
            exp: expires_at.unix_timestamp(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|err| TokenSignerError::Encode(err.to_string()))?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let tag = self.mac(encoded.as_bytes()).finalize().into_bytes();
        Ok(format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Return the e-mail address a token was issued for, or `None`.
    pub fn verify(&self, token: &str, now: OffsetDateTime) -> Option<String> {
        let (encoded, mac) = token.trim().split_once('.')?;
        if encoded.is_empty() || mac.is_empty() {
            return None;
        }

        let provided = URL_SAFE_NO_PAD.decode(mac).ok()?;
        self.mac(encoded.as_bytes()).verify_slice(&provided).ok()?;

        let json = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let payload: TokenPayload = serde_json::from_slice(&json).ok()?;
        if payload.exp <= now.unix_timestamp() || payload.email.is_empty() {
            return None;
        }

        Some(payload.email)
    }

    fn mac(&self, message: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(message);
        mac
    }
}
