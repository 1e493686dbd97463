//! Signed unsubscribe token verification.
//!
//! Wire format, before URL-safe base64:
//!
//! ```text
//! payload_bytes || 0x2E ('.') || HMAC-SHA256(secret, payload_bytes)   (32 bytes)
//! ```
//!
//! `payload_bytes` is a JSON object carrying at least `email` and `exp`
//! (Unix seconds). Issuing tokens happens elsewhere; this module only checks
//! them. Checks run in a fixed order and stop at the first failure:
//! decoding, length, separator, signature, payload, expiry.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag.
pub const SIGNATURE_LEN: usize = 32;

/// Byte between payload and signature.
pub const SEPARATOR: u8 = b'.';

/// Smallest decodable token: separator plus signature.
const MIN_TOKEN_LEN: usize = SIGNATURE_LEN + 1;

/// A verified claim. Only constructed once every check has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Trimmed, lowercased address.
    pub email: String,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

/// Why a token was refused. Clients only ever see `tag()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("no token supplied")]
    MissingToken,
    #[error("token could not be decoded")]
    MalformedToken,
    #[error("token signature does not match")]
    SignatureInvalid,
    #[error("token payload is invalid")]
    PayloadInvalid,
    #[error("token has expired")]
    TokenExpired,
}

impl VerifyError {
    /// Short reason returned to clients.
    pub fn tag(&self) -> &'static str {
        match self {
            VerifyError::MissingToken => "missing token",
            VerifyError::MalformedToken => "bad token",
            VerifyError::SignatureInvalid => "signature",
            VerifyError::PayloadInvalid => "payload",
            VerifyError::TokenExpired => "expired",
        }
    }
}

/// Verifier bound to a signing secret.
#[derive(Clone)]
pub struct Verifier {
    secret: Vec<u8>,
}

impl Verifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claim, VerifyError> {
        verify(token, &self.secret, now)
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier").finish_non_exhaustive()
    }
}

/// Verify `token` against `secret` at time `now`.
pub fn verify(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claim, VerifyError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(VerifyError::MissingToken);
    }

    let raw = decode_url_safe(token).ok_or(VerifyError::MalformedToken)?;
    if raw.len() < MIN_TOKEN_LEN {
        return Err(VerifyError::MalformedToken);
    }

    let (head, signature) = raw.split_at(raw.len() - SIGNATURE_LEN);
    let (payload, separator) = head.split_at(head.len() - 1);
    if separator[0] != SEPARATOR {
        return Err(VerifyError::MalformedToken);
    }

    let expected = sign(secret, payload).ok_or(VerifyError::SignatureInvalid)?;
    if !fixed_time_eq(&expected, signature) {
        return Err(VerifyError::SignatureInvalid);
    }

    let (email, exp) = parse_claim(payload).ok_or(VerifyError::PayloadInvalid)?;

    // Equal is still valid; only a strictly later clock rejects.
    if now.timestamp() as f64 > exp {
        return Err(VerifyError::TokenExpired);
    }

    Ok(Claim {
        email: email.trim().to_lowercase(),
        exp: exp.floor() as i64,
    })
}

/// Decode URL-safe base64, tolerating missing padding.
fn decode_url_safe(token: &str) -> Option<Vec<u8>> {
    let mut standard: String = token
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let pad = (4 - standard.len() % 4) % 4;
    standard.push_str(&"=".repeat(pad));
    BASE64.decode(standard).ok()
}

fn sign(secret: &[u8], payload: &[u8]) -> Option<[u8; SIGNATURE_LEN]> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    let mut tag = [0u8; SIGNATURE_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Some(tag)
}

/// Length check first, then a comparison over every byte.
fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Pull `email` and `exp` out of the payload. Other fields are ignored.
fn parse_claim(payload: &[u8]) -> Option<(String, f64)> {
    let text = std::str::from_utf8(payload).ok()?;
    let document: Map<String, Value> = serde_json::from_str(text).ok()?;

    let email = document
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.trim().is_empty())?
        .to_string();

    let exp = match document.get("exp")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !exp.is_finite() {
        return None;
    }

    Some((email, exp))
}
