use crate::error::{CsrfError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a token salt.
pub const SALT_LEN: usize = 32;

const SEPARATOR: char = '.';

/// Signs, builds and verifies CSRF tokens.
///
/// A token is `base64(salt) "." issued_at_millis "." base64(signature)`
/// where the signature is HMAC-SHA256 over the first two segments joined
/// by the separator.
///
/// The keyed MAC is cloned for every computation, so a codec can be shared
/// between any number of concurrent requests without locking.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
}

impl TokenCodec {
    /// Create a codec keyed by `secret`
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(CsrfError::config("secret must not be empty"));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CsrfError::config(format!("unusable HMAC key: {}", e)))?;
        Ok(Self { mac })
    }

    /// HMAC-SHA256 over `base64(salt) "." issued_at_millis`
    pub fn sign(&self, salt: &[u8], issued_at_millis: i64) -> Vec<u8> {
        self.sign_payload(&payload(&STANDARD.encode(salt), &issued_at_millis.to_string()))
    }

    /// Build the token string for a known salt and timestamp
    pub fn encode_with(&self, salt: &[u8], issued_at_millis: i64) -> String {
        let salted = payload(&STANDARD.encode(salt), &issued_at_millis.to_string());
        let signature = STANDARD.encode(self.sign_payload(&salted));
        format!("{}{}{}", salted, SEPARATOR, signature)
    }

    /// Build a fresh token with a random salt drawn from `rng`
    pub fn generate<R>(&self, rng: &mut R, now_millis: i64) -> String
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);
        self.encode_with(&salt, now_millis)
    }

    /// Split `token` and check its signature.
    ///
    /// The timestamp segment is not interpreted here; see
    /// [`CsrfToken::issued_at_millis`].
    pub fn verify_signature<'a>(&self, token: &'a str) -> Result<CsrfToken<'a>> {
        let parts = CsrfToken::parse(token)?;

        let provided = STANDARD
            .decode(parts.signature)
            .map_err(|_| CsrfError::BadSignature)?;

        let mut mac = self.mac.clone();
        mac.update(payload(parts.salt, parts.issued_at).as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| CsrfError::BadSignature)?;

        Ok(parts)
    }

    /// Full check: format, signature, timestamp and expiry.
    ///
    /// Returns the issue time on success.
    pub fn verify(&self, token: &str, now_millis: i64, timeout_millis: i64) -> Result<i64> {
        let parts = self.verify_signature(token)?;
        let issued_at = parts.issued_at_millis()?;
        if parts.is_expired(now_millis, timeout_millis)? {
            return Err(CsrfError::ExpiredToken);
        }
        Ok(issued_at)
    }

    fn sign_payload(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

/// The three segments of a token string, not yet trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrfToken<'a> {
    /// Base64 salt
    pub salt: &'a str,

    /// Decimal issue timestamp, as sent
    pub issued_at: &'a str,

    /// Base64 HMAC signature
    pub signature: &'a str,
}

impl<'a> CsrfToken<'a> {
    /// Split a token into its segments. Anything other than exactly three
    /// non-empty segments is malformed.
    pub fn parse(token: &'a str) -> Result<Self> {
        let segments: Vec<&str> = token.split(SEPARATOR).collect();
        if segments.len() != 3 {
            return Err(CsrfError::MalformedToken(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CsrfError::MalformedToken("empty segment".to_string()));
        }

        Ok(Self {
            salt: segments[0],
            issued_at: segments[1],
            signature: segments[2],
        })
    }

    /// Parse the timestamp segment
    pub fn issued_at_millis(&self) -> Result<i64> {
        self.issued_at.parse().map_err(|_| {
            CsrfError::MalformedToken(format!("timestamp is not a number: {}", self.issued_at))
        })
    }

    /// Whether `now > issued_at + timeout`
    pub fn is_expired(&self, now_millis: i64, timeout_millis: i64) -> Result<bool> {
        let issued_at = self.issued_at_millis()?;
        Ok(now_millis > issued_at.saturating_add(timeout_millis))
    }
}

fn payload(salt: &str, issued_at: &str) -> String {
    format!("{}{}{}", salt, SEPARATOR, issued_at)
}
