//! Opaque token minting and hashing
//!
//! Raw tokens are returned to the caller exactly once; only the sha256
//! hex digest is ever persisted. The 4-digit PIN is deliberately
//! low-entropy: it is short-lived, table-scoped and rate-limited, so it
//! is stored as-is rather than hashed.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Mint a 32-byte random token. Returns `(raw, hash)`.
pub fn mint_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    let hash = hash_token(&raw);
    (raw, hash)
}

/// sha256 hex digest of a raw token
pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Generate a random 4-digit table PIN
pub fn generate_pin() -> String {
    let n: u32 = rand::Rng::gen_range(&mut rand::thread_rng(), 0..10_000);
    format!("{n:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_token_never_equals_stored_hash() {
        let (raw, hash) = mint_token();
        assert_ne!(raw, hash);
        assert_eq!(hash_token(&raw), hash);
    }

    #[test]
    fn pin_is_four_digits() {
        for _ in 0..100 {
            let pin = generate_pin();
            assert_eq!(pin.len(), 4);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
