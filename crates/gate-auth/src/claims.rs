//! Bearer credential decoding.
//!
//! Credentials are three dot-separated base64 segments: header, payload and
//! signature. The payload is a JSON object; the fields read here are
//! `userId`, `email` and `exp`. Signature checking is delegated to a
//! [`ClaimVerifier`], which may be a no-op.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::IdentityError;

type HmacSha256 = Hmac<Sha256>;

/// The three segments of a credential, borrowed from the raw token.
#[derive(Debug, Clone, Copy)]
pub struct CredentialParts<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
    /// `header.payload`, the input covered by the signature.
    pub signed: &'a str,
}

impl<'a> CredentialParts<'a> {
    /// Split a raw token into its segments.
    pub fn split(token: &'a str) -> Result<Self, IdentityError> {
        let malformed = IdentityError::MalformedCredential("expected three dot-separated segments");
        let (signed, signature) = token.rsplit_once('.').ok_or(malformed.clone())?;
        let (header, payload) = signed.split_once('.').ok_or(malformed.clone())?;
        if payload.contains('.') || header.is_empty() || payload.is_empty() {
            return Err(malformed);
        }
        Ok(Self {
            header,
            payload,
            signature,
            signed,
        })
    }
}

/// Decode one segment, accepting URL-safe unpadded or standard base64.
pub fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD.decode(segment))
        .ok()
}

/// Claims the resolver relies on. Unknown claims are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// Expiry in unix seconds.
    pub exp: Option<f64>,
}

impl Claims {
    /// Parse claims from a decoded payload.
    ///
    /// Claims of the wrong JSON type are treated as absent, and empty strings
    /// count as missing.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, IdentityError> {
        let map: Map<String, Value> = serde_json::from_slice(bytes)
            .map_err(|_| IdentityError::MalformedCredential("payload is not a JSON object"))?;
        let text = |name: &str| {
            map.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Ok(Self {
            user_id: text("userId"),
            email: text("email"),
            exp: map.get("exp").and_then(Value::as_f64),
        })
    }

    /// Whether `exp` is present and earlier than `now` (unix seconds).
    #[allow(clippy::cast_possible_truncation)]
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| (exp as i64) < now)
    }

    /// Whether the claims name a user at all.
    pub fn has_identity(&self) -> bool {
        self.user_id.is_some() || self.email.is_some()
    }
}

/// Signature policy applied before claims are trusted.
pub trait ClaimVerifier: Send + Sync + fmt::Debug {
    /// Accept or reject the credential's signature.
    fn verify(&self, parts: &CredentialParts<'_>) -> Result<(), IdentityError>;

    /// Whether this verifier actually checks anything.
    fn is_enforcing(&self) -> bool;
}

/// Accepts every signature. Claims are trusted at face value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unverified;

impl ClaimVerifier for Unverified {
    #[inline]
    fn verify(&self, _parts: &CredentialParts<'_>) -> Result<(), IdentityError> {
        Ok(())
    }

    #[inline]
    fn is_enforcing(&self) -> bool {
        false
    }
}

/// HMAC-SHA256 verification with a shared secret.
#[derive(Clone)]
pub struct Hs256Verifier {
    secret: Vec<u8>,
}

impl Hs256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, IdentityError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| IdentityError::InvalidSignature)
    }

    /// Signature segment for `header.payload`, URL-safe and unpadded.
    pub fn sign(&self, signed: &str) -> Result<String, IdentityError> {
        let mut mac = self.mac()?;
        mac.update(signed.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Hs256Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Verifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ClaimVerifier for Hs256Verifier {
    fn verify(&self, parts: &CredentialParts<'_>) -> Result<(), IdentityError> {
        let header = decode_segment(parts.header).ok_or(IdentityError::InvalidSignature)?;
        let header: Map<String, Value> =
            serde_json::from_slice(&header).map_err(|_| IdentityError::InvalidSignature)?;
        if header.get("alg").and_then(Value::as_str) != Some("HS256") {
            return Err(IdentityError::InvalidSignature);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(parts.signature)
            .map_err(|_| IdentityError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(parts.signed.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| IdentityError::InvalidSignature)
    }

    #[inline]
    fn is_enforcing(&self) -> bool {
        true
    }
}

/// Decode and validate a credential up to, but not including, the store lookup.
///
/// Order: shape, signature, payload, expiry, identity.
pub fn parse_credential(
    token: &str,
    verifier: &dyn ClaimVerifier,
    now: i64,
) -> Result<Claims, IdentityError> {
    let parts = CredentialParts::split(token.trim())?;
    verifier.verify(&parts)?;

    let payload = decode_segment(parts.payload)
        .ok_or(IdentityError::MalformedCredential("payload is not base64"))?;
    let claims = Claims::from_payload(&payload)?;

    if claims.is_expired(now) {
        return Err(IdentityError::ExpiredCredential);
    }
    if !claims.has_identity() {
        return Err(IdentityError::MissingIdentity);
    }
    Ok(claims)
}

/// Build an unsigned token from a JSON payload. Used by tests and tooling.
pub fn encode_unsigned(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.")
}
