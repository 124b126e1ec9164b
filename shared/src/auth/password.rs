//! # Password Hashing with PBKDF2-HMAC-SHA256
//!
//! Secure password storage for the user directory.
//!
//! ## Storage Format
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Password Hashing                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  "SecureP@ss123"  ──►  PBKDF2-HMAC-SHA256  ──►  base64(salt ‖ key)   │
//! │        │               100 000 iterations              │             │
//! │   (plaintext)          16-byte random salt        (stored blob)      │
//! │                        32-byte derived key                           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The salt and derived key are concatenated and base64-encoded as one
//! opaque blob; decoding anything shorter than 48 bytes is rejected as
//! corrupt rather than verified against.
//!
//! ## Security Notes
//!
//! - Each hash carries a fresh random salt - identical passwords produce
//!   different blobs.
//! - Verification re-derives with the stored salt and compares in
//!   constant time (`subtle`), so a mismatch reveals nothing about how
//!   close the guess was.
//! - Derivation takes on the order of 100 ms; callers must not hold
//!   database transactions across it.
//!
//! ## Related Documentation
//!
//! - Opaque token fingerprints: [`crate::auth::token`]
//! - Strength policy: [`PasswordPolicy`]

use crate::errors::ApiError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// PBKDF2 iteration count. Part of the stored-blob contract: changing it
/// invalidates every existing hash, so bump only with a migration story.
const ITERATIONS: u32 = 100_000;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

// =============================================================================
// Password Hasher
// =============================================================================

/// Secure password hashing service.
///
/// ## Thread Safety
///
/// Stateless; `Clone + Send + Sync` and safe for concurrent use. Each
/// hash operation draws a new random salt from the OS.
#[derive(Clone, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hashes a password for storage.
    ///
    /// ## Process
    ///
    /// 1. Draw a 16-byte salt from the OS randomness source
    /// 2. Derive a 32-byte key with PBKDF2-HMAC-SHA256 at 100k iterations
    /// 3. Encode `salt ‖ key` as base64
    ///
    /// ## Panics
    ///
    /// Panics if the OS randomness source fails - a host without working
    /// randomness must not mint credentials.
    pub fn hash(&self, password: &str) -> Result<String, ApiError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut key);

        let mut blob = Vec::with_capacity(SALT_LEN + KEY_LEN);
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&key);

        Ok(STANDARD.encode(blob))
    }

    /// Verifies a password against a stored blob.
    ///
    /// Re-derives with the stored salt and compares the full derived key
    /// in constant time.
    ///
    /// ## Returns
    ///
    /// - `Ok(true)` - password matches
    /// - `Ok(false)` - password does not match
    /// - `Err(..)` - the stored blob is not valid base64 or is shorter
    ///   than 48 bytes (corrupt record, never a user error)
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, ApiError> {
        let blob = STANDARD.decode(stored).map_err(|_| ApiError::InternalError {
            message: "Stored password hash is not valid base64".to_string(),
        })?;

        if blob.len() < SALT_LEN + KEY_LEN {
            return Err(ApiError::InternalError {
                message: "Stored password hash is truncated".to_string(),
            });
        }

        let (salt, expected) = blob.split_at(SALT_LEN);

        let mut derived = vec![0u8; expected.len()];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, ITERATIONS, &mut derived);

        Ok(derived.ct_eq(expected).into())
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

// =============================================================================
// Password Policy
// =============================================================================

/// Validates password strength before hashing.
///
/// ## Requirements
///
/// | Requirement | Reason |
/// |-------------|--------|
/// | 8+ characters | Search space |
/// | 1+ uppercase | Character-set breadth |
/// | 1+ lowercase | Character-set breadth |
/// | 1+ digit | Character-set breadth |
/// | 1+ non-alphanumeric | Character-set breadth |
pub struct PasswordPolicy;

impl PasswordPolicy {
    /// Checks a candidate password against the strength policy.
    ///
    /// ## Returns
    ///
    /// - `Ok(())` - password meets all requirements
    /// - `Err(Vec<&str>)` - every failed requirement, for field-level
    ///   error responses
    pub fn validate(password: &str) -> Result<(), Vec<&'static str>> {
        let mut errors = Vec::new();

        if password.chars().count() < 8 {
            errors.push("Password must be at least 8 characters long");
        }

        if !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Password must contain at least one uppercase letter");
        }

        if !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Password must contain at least one lowercase letter");
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one digit");
        }

        if !password.chars().any(|c| !c.is_alphanumeric()) {
            errors.push("Password must contain at least one special character");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_correct_password() {
        let hasher = PasswordHasher::new();
        let password = "SecureP@ss123";

        let blob = hasher.hash(password).unwrap();

        assert_ne!(blob, password);
        assert!(hasher.verify(password, &blob).unwrap());
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = PasswordHasher::new();
        let blob = hasher.hash("SecureP@ss123").unwrap();

        assert!(!hasher.verify("WrongP@ss123", &blob).unwrap());
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let hasher = PasswordHasher::new();
        let password = "SecureP@ss123";

        let blob1 = hasher.hash(password).unwrap();
        let blob2 = hasher.hash(password).unwrap();

        // Unique salt per hash
        assert_ne!(blob1, blob2);
        assert!(hasher.verify(password, &blob1).unwrap());
        assert!(hasher.verify(password, &blob2).unwrap());
    }

    #[test]
    fn test_blob_is_48_bytes_before_encoding() {
        let hasher = PasswordHasher::new();
        let blob = hasher.hash("SecureP@ss123").unwrap();

        let decoded = STANDARD.decode(&blob).unwrap();
        assert_eq!(decoded.len(), SALT_LEN + KEY_LEN);
    }

    #[test]
    fn test_verify_rejects_truncated_blob() {
        let hasher = PasswordHasher::new();
        let short = STANDARD.encode([0u8; 47]);

        assert!(hasher.verify("whatever", &short).is_err());
    }

    #[test]
    fn test_verify_rejects_non_base64_blob() {
        let hasher = PasswordHasher::new();
        assert!(hasher.verify("whatever", "!!! not base64 !!!").is_err());
    }

    #[test]
    fn test_policy_accepts_strong_passwords() {
        assert!(PasswordPolicy::validate("SecureP@ss123").is_ok());
        assert!(PasswordPolicy::validate("Ab3!efgh").is_ok());
    }

    #[test]
    fn test_policy_too_short() {
        let errors = PasswordPolicy::validate("Ab3!efg").unwrap_err();
        assert!(errors.contains(&"Password must be at least 8 characters long"));
    }

    #[test]
    fn test_policy_missing_classes() {
        let errors = PasswordPolicy::validate("alllowercase1!").unwrap_err();
        assert!(errors.contains(&"Password must contain at least one uppercase letter"));

        let errors = PasswordPolicy::validate("ALLUPPERCASE1!").unwrap_err();
        assert!(errors.contains(&"Password must contain at least one lowercase letter"));

        let errors = PasswordPolicy::validate("NoDigitsHere!").unwrap_err();
        assert!(errors.contains(&"Password must contain at least one digit"));

        let errors = PasswordPolicy::validate("NoSymbols123").unwrap_err();
        assert!(errors.contains(&"Password must contain at least one special character"));
    }

    #[test]
    fn test_policy_collects_multiple_errors() {
        let errors = PasswordPolicy::validate("short").unwrap_err();
        assert!(errors.len() > 1);
    }
}
