//! Hashing helpers: password storage, opaque tokens and webhook signatures.

use crate::error::{Result, StoreError};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const PASSWORD_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;

/// Hash a password as `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.
pub fn hash_password(password: &str, iterations: u32) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let derived = pbkdf2_sha256(password.as_bytes(), &salt, iterations)?;
    Ok(format!(
        "{PASSWORD_SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(derived)
    ))
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != PASSWORD_SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };

    let Ok(derived) = pbkdf2_sha256(password.as_bytes(), &salt, iterations) else {
        return false;
    };
    derived[..].ct_eq(&expected[..]).into()
}

/// Stand-in hash for unknown accounts, so a failed lookup costs as much as a
/// wrong password.
pub fn decoy_hash(iterations: u32) -> String {
    format!(
        "{PASSWORD_SCHEME}${iterations}${}${}",
        hex::encode([0u8; SALT_LEN]),
        hex::encode([0u8; 32])
    )
}

/// PBKDF2-HMAC-SHA256 with a 32-byte output.
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> Result<[u8; 32]> {
    if iterations == 0 {
        return Err(StoreError::Internal("pbkdf2 needs at least one iteration".into()));
    }
    #[cfg(test)]
    tests::DERIVATIONS.with(|count| count.set(count.get() + 1));
    let mut output = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut output);
    Ok(output)
}

/// 32 random bytes, hex encoded. Used for sessions and unsubscribe links.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Uppercase alphanumeric string of the given length.
pub fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StoreError::Internal(format!("hmac key: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature produced by [`sign`].
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        /// Key derivations run on this thread.
        pub(crate) static DERIVATIONS: Cell<usize> = Cell::new(0);
    }

    pub(crate) fn derivations() -> usize {
        DERIVATIONS.with(Cell::get)
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("curls4days", 1000).unwrap();
        assert!(hash.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("curls4days", &hash));
        assert!(!verify_password("curls4day", &hash));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let a = hash_password("samepass1", 10).unwrap();
        let b = hash_password("samepass1", 10).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$aa$bb"));
        assert!(!verify_password("x", "pbkdf2-sha256$abc$00$00"));
    }

    #[test]
    fn test_pbkdf2_known_vector() {
        // RFC 7914 section 11, first 32 bytes of P="passwd", S="salt", c=1
        let derived = pbkdf2_sha256(b"passwd", b"salt", 1).unwrap();
        assert_eq!(
            hex::encode(derived),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_decoy_hash_costs_a_full_derivation() {
        let decoy = decoy_hash(1000);
        assert!(decoy.starts_with("pbkdf2-sha256$1000$"));
        let before = derivations();
        assert!(!verify_password("anything1", &decoy));
        assert_eq!(derivations(), before + 1);
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"order_id":"abc"}"#;
        let signature = sign("whsec", body).unwrap();
        assert!(verify_signature("whsec", body, &signature));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("", body, &signature));
        assert!(!verify_signature("whsec", body, "not-hex"));
    }

    #[test]
    fn test_random_code_shape() {
        let code = random_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
