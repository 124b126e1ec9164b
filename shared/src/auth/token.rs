//! # Secure Token Mint
//!
//! Cryptographically random opaque tokens and identity generation.
//!
//! Three token families come from here:
//!
//! | Token | Lifetime | Storage |
//! |-------|----------|---------|
//! | Refresh (continuation) | 7 days | SHA-256 fingerprint only |
//! | Email verification | 24 hours | Token value |
//! | Password reset | 1 hour | Token value |
//!
//! The bearer value of a refresh token is returned to the client exactly
//! once and never persisted; lookups go through [`fingerprint`], which
//! hashes the presented bearer and matches the stored digest by equality.
//!
//! All randomness comes from the OS source (`OsRng`). If the platform
//! cannot supply randomness the process aborts - there is no fallback to
//! a weaker generator.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Default entropy for opaque tokens, in bytes.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

// =============================================================================
// Generation
// =============================================================================

/// Generates a URL-safe random token of `n` bytes of entropy.
///
/// The output is unpadded URL-safe base64, so it can ride in links and
/// cookies without escaping.
///
/// ## Panics
///
/// Panics if the OS randomness source fails; token minting must never
/// degrade to predictable output.
pub fn generate_secure_token(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a token with the default 32 bytes of entropy.
pub fn generate_token() -> String {
    generate_secure_token(DEFAULT_TOKEN_BYTES)
}

/// Generates a fresh UUID v4 identity.
pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

// =============================================================================
// Fingerprinting
// =============================================================================

/// Computes the storage fingerprint of an opaque token.
///
/// SHA-256 of the UTF-8 bearer value, base64-encoded. Unsalted: equality
/// lookup is the only query ever run against it, and the input already
/// carries 256 bits of entropy.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    STANDARD.encode(hasher.finalize())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = generate_token();
        // 32 bytes => 43 unpadded base64 chars
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_custom_entropy_length() {
        // 16 bytes => 22 unpadded base64 chars
        assert_eq!(generate_secure_token(16).len(), 22);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let token = "some_bearer_value";
        assert_eq!(fingerprint(token), fingerprint(token));
    }

    #[test]
    fn test_fingerprint_differs_per_token() {
        assert_ne!(fingerprint("token_a"), fingerprint("token_b"));
    }

    #[test]
    fn test_fingerprint_is_base64_sha256() {
        // 32-byte digest => 44 padded base64 chars
        assert_eq!(fingerprint("x").len(), 44);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
