//! Signed cookie codec.
//!
//! Produces tamper-evident tokens of the form `<value>|<hex_hmac>`, used for
//! both the login-session cookie and the visit counter. Verification failure
//! is always `None`, never an error — callers fall back to their defaults
//! (visit count 0, anonymous session).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Delimiter between payload and digest. Must not appear in payloads.
const TOKEN_DELIMITER: char = '|';

/// HMAC-SHA256 token signer keyed with a purpose-scoped secret.
///
/// The codec is generic over any delimiter-free string payload; purpose
/// scoping lives in configuration — the session and visit-counter cookies
/// each get a signer with a distinct secret, so a token minted for one
/// purpose never verifies for the other.
#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
}

impl TokenSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign a payload, producing `"<value>|<hex_hmac>"`.
    ///
    /// The payload must not contain `|` — numeric IDs and counters satisfy
    /// this. A payload that does will sign but never verify back.
    pub fn sign(&self, value: &str) -> String {
        debug_assert!(
            !value.contains(TOKEN_DELIMITER),
            "token payload must not contain the delimiter"
        );
        format!("{value}{TOKEN_DELIMITER}{}", self.digest(value))
    }

    /// Verify a token and return its payload.
    ///
    /// Anything malformed — missing delimiter, non-hex digest, digest
    /// mismatch — yields `None`. The comparison is constant-time.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (value, sig) = token.split_once(TOKEN_DELIMITER)?;
        let expected = hex::decode(sig).ok()?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(value.as_bytes());
        mac.verify_slice(&expected).ok()?;
        Some(value.to_owned())
    }

    fn digest(&self, value: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
