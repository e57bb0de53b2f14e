//! Salted HMAC-SHA256 password digests.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Delimiter between the hex digest and the salt in a stored digest.
const DIGEST_DELIMITER: char = ',';

/// Length of a generated salt, in characters.
const SALT_LEN: usize = 8;

/// Alphabet salts are drawn from.
const SALT_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Salted password hasher keyed with the server secret.
///
/// Stateless and cheap to clone; construct once at startup and share across
/// request handlers without synchronization.
#[derive(Clone)]
pub struct CredentialHasher {
    secret: String,
}

impl CredentialHasher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hash a password with a fresh random salt.
    ///
    /// Two calls with the same credentials produce different digests (the
    /// salts differ) yet both verify.
    pub fn hash(&self, username: &str, password: &str) -> String {
        self.hash_with_salt(username, password, &generate_salt())
    }

    /// Hash a password with an explicit salt.
    ///
    /// Deterministic: the same (username, password, salt) always yields the
    /// same digest string `"<hex_hmac>,<salt>"`.
    pub fn hash_with_salt(&self, username: &str, password: &str, salt: &str) -> String {
        let key = format!("{salt}{}", self.secret);
        let mut mac =
            HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
        mac.update(username.as_bytes());
        mac.update(password.as_bytes());
        format!(
            "{}{DIGEST_DELIMITER}{salt}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    /// Verify a presented password against a stored digest.
    ///
    /// The salt is recovered from the digest itself, never freshly
    /// generated. A digest with no delimiter verifies false rather than
    /// erroring.
    pub fn verify(&self, username: &str, password: &str, digest: &str) -> bool {
        let Some((_, salt)) = digest.split_once(DIGEST_DELIMITER) else {
            return false;
        };
        let attempt = self.hash_with_salt(username, password, salt);
        constant_time_eq(attempt.as_bytes(), digest.as_bytes())
    }
}

/// Generate a fixed-length salt from the alphanumeric alphabet using the OS
/// CSPRNG.
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| SALT_ALPHABET[*b as usize % SALT_ALPHABET.len()] as char)
        .collect()
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new("arma virumque cano")
    }

    #[test]
    fn hash_then_verify_succeeds() {
        let h = hasher();
        let digest = h.hash("alice", "secret1");
        assert!(h.verify("alice", "secret1", &digest));
    }

    #[test]
    fn wrong_password_fails() {
        let h = hasher();
        let digest = h.hash("alice", "secret1");
        assert!(!h.verify("alice", "secret2", &digest));
    }

    #[test]
    fn digest_is_bound_to_username() {
        let h = hasher();
        let digest = h.hash("alice", "secret1");
        assert!(!h.verify("bob", "secret1", &digest));
    }

    #[test]
    fn empty_password_still_hashes_and_verifies() {
        let h = hasher();
        let digest = h.hash("alice", "");
        assert!(h.verify("alice", "", &digest));
        assert!(!h.verify("alice", "x", &digest));
    }

    #[test]
    fn explicit_salt_is_deterministic() {
        let h = hasher();
        let a = h.hash_with_salt("alice", "secret1", "ABCD1234");
        let b = h.hash_with_salt("alice", "secret1", "ABCD1234");
        assert_eq!(a, b);
    }

    #[test]
    fn auto_salts_differ_but_both_verify() {
        let h = hasher();
        let a = h.hash("alice", "secret1");
        let b = h.hash("alice", "secret1");
        assert_ne!(a, b);
        assert!(h.verify("alice", "secret1", &a));
        assert!(h.verify("alice", "secret1", &b));
    }

    #[test]
    fn digest_format_is_hex_comma_salt() {
        let h = hasher();
        let digest = h.hash_with_salt("alice", "secret1", "SALT0001");
        let (hex_part, salt) = digest.split_once(',').unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(salt, "SALT0001");
    }

    #[test]
    fn malformed_digest_verifies_false() {
        let h = hasher();
        assert!(!h.verify("alice", "secret1", ""));
        assert!(!h.verify("alice", "secret1", "no-delimiter-here"));
        assert!(!h.verify("alice", "secret1", "deadbeef"));
    }

    #[test]
    fn different_secrets_produce_incompatible_digests() {
        let a = CredentialHasher::new("secret-a");
        let b = CredentialHasher::new("secret-b");
        let digest = a.hash_with_salt("alice", "secret1", "SALT0001");
        assert!(!b.verify("alice", "secret1", &digest));
    }

    #[test]
    fn generated_salt_is_fixed_length_alphanumeric() {
        for _ in 0..32 {
            let salt = generate_salt();
            assert_eq!(salt.len(), SALT_LEN);
            assert!(salt.bytes().all(|b| SALT_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
