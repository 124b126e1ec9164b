//! # Permission Bitmap
//!
//! A fixed 128-bit permission space where each named permission occupies a
//! single bit. Authorization checks reduce to bitwise arithmetic:
//!
//! ```text
//! has(b, p)            ≡  (b ∧ p) = p
//! grant(b, p)          ≡  b ∨ p
//! revoke(b, p)         ≡  b ∧ ¬p
//! can_delegate(g, t)   ≡  (t ∧ g) = t        (t is a subset of g)
//! ```
//!
//! ## Storage & Wire Representation
//!
//! The bitmap is split into two unsigned 64-bit halves for storage:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │        high (bits 64-127)    │        low (bits 0-63)       │
//! └──────────────────────────────┴──────────────────────────────┘
//!          merge(low, high) = (high << 64) | low
//! ```
//!
//! On the wire and in the database both halves travel as **decimal
//! strings**: they exceed 53 bits and cannot survive an IEEE-754 double,
//! and bit 63 is a valid permission bit, so a signed 64-bit column would
//! corrupt it. See [`PermissionSet::to_decimal_parts`].
//!
//! ## Related Documentation
//!
//! - Permission catalog: [`crate::permissions::catalog`]
//! - Delegation rule: the permission service enforces
//!   [`PermissionSet::can_delegate`] on every grant/revoke/role write.

use serde::{Deserialize, Serialize};

// =============================================================================
// Permission Set
// =============================================================================

/// A set of permissions encoded as bits in a 128-bit word.
///
/// `PermissionSet` is `Copy` and all operations are pure; it never
/// allocates. Bit positions are assigned by the catalog and are part of
/// the storage format - they must not be renumbered once persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u128);

impl PermissionSet {
    /// The empty set (no permissions).
    pub const EMPTY: Self = Self(0);

    /// Creates a set from a raw 128-bit word.
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// Creates a set with a single bit at `position` (0..=127).
    ///
    /// ## Panics
    ///
    /// Panics if `position > 127`. Catalog bit positions are static and
    /// verified by tests, so this is unreachable at runtime.
    pub const fn single(position: u32) -> Self {
        assert!(position < 128);
        Self(1u128 << position)
    }

    /// Returns the raw 128-bit word.
    pub const fn bits(self) -> u128 {
        self.0
    }

    /// Rebuilds a set from its two stored 64-bit halves.
    pub const fn from_parts(low: u64, high: u64) -> Self {
        Self(((high as u128) << 64) | low as u128)
    }

    /// Splits the set into `(low, high)` 64-bit halves for storage.
    pub const fn split(self) -> (u64, u64) {
        (self.0 as u64, (self.0 >> 64) as u64)
    }

    /// Returns `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set membership: every bit of `other` is present in `self`.
    pub const fn has(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` is present in `self`.
    pub const fn has_any(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `self` with every bit of `other` added. Idempotent.
    #[must_use]
    pub const fn grant(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `self` with every bit of `other` removed. Idempotent.
    #[must_use]
    pub const fn revoke(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The Superset Rule: a grantor holding `self` may delegate `target`
    /// iff `target` is a subset of `self`.
    ///
    /// Reflexive (`g.can_delegate(g)`) and monotone: if `g` can delegate
    /// `t`, it can delegate any subset of `t`.
    pub const fn can_delegate(self, target: Self) -> bool {
        target.0 & self.0 == target.0
    }

    // =========================================================================
    // Decimal wire form
    // =========================================================================

    /// Encodes both halves as decimal strings for storage and JSON.
    pub fn to_decimal_parts(self) -> (String, String) {
        let (low, high) = self.split();
        (low.to_string(), high.to_string())
    }

    /// Parses the stored decimal-string halves back into a set.
    ///
    /// Returns `None` if either half is not a valid unsigned 64-bit
    /// decimal - stored values are written by [`Self::to_decimal_parts`],
    /// so a parse failure means the row is corrupt.
    pub fn from_decimal_parts(low: &str, high: &str) -> Option<Self> {
        let low = low.parse::<u64>().ok()?;
        let high = high.parse::<u64>().ok()?;
        Some(Self::from_parts(low, high))
    }
}

impl std::ops::BitOr for PermissionSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for PermissionSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const P: PermissionSet = PermissionSet::single(5);
    const Q: PermissionSet = PermissionSet::single(70);

    #[test]
    fn test_grant_then_has() {
        let b = PermissionSet::EMPTY.grant(P);
        assert!(b.has(P));
        assert!(!b.has(Q));
    }

    #[test]
    fn test_revoke_removes() {
        let b = PermissionSet::EMPTY.grant(P).grant(Q);
        let b = b.revoke(P);
        assert!(!b.has(P));
        assert!(b.has(Q));
    }

    #[test]
    fn test_grant_revoke_idempotent() {
        let b = PermissionSet::from_bits(0b1010);
        assert_eq!(b.grant(P).grant(P), b.grant(P));
        assert_eq!(b.revoke(P).revoke(P), b.revoke(P));
    }

    #[test]
    fn test_delegation_reflexive() {
        let b = PermissionSet::from_bits(0xDEAD_BEEF);
        assert!(b.can_delegate(b));
    }

    #[test]
    fn test_delegation_monotone() {
        let g = PermissionSet::from_bits(0b1111);
        let t = PermissionSet::from_bits(0b0110);
        assert!(g.can_delegate(t));
        // Any further intersection of t stays delegable
        let s = PermissionSet::from_bits(0b0100);
        assert!(g.can_delegate(PermissionSet::from_bits(t.bits() & s.bits())));
    }

    #[test]
    fn test_delegation_rejects_superset() {
        let g = PermissionSet::single(40);
        let t = g.grant(PermissionSet::single(41));
        assert!(!g.can_delegate(t));
    }

    #[test]
    fn test_split_merge_round_trip() {
        for bits in [
            0u128,
            1,
            1 << 63,
            1 << 64,
            u128::MAX,
            0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210,
        ] {
            let set = PermissionSet::from_bits(bits);
            let (low, high) = set.split();
            assert_eq!(PermissionSet::from_parts(low, high), set);
        }
    }

    #[test]
    fn test_bit_63_survives_decimal_round_trip() {
        // Bit 63 is the sign bit of an i64; the decimal-string form must
        // carry it without corruption.
        let set = PermissionSet::single(63);
        let (low, high) = set.to_decimal_parts();
        assert_eq!(low, (1u64 << 63).to_string());
        assert_eq!(high, "0");
        assert_eq!(PermissionSet::from_decimal_parts(&low, &high), Some(set));
    }

    #[test]
    fn test_decimal_parts_reject_garbage() {
        assert!(PermissionSet::from_decimal_parts("not-a-number", "0").is_none());
        assert!(PermissionSet::from_decimal_parts("0", "-1").is_none());
        assert!(PermissionSet::from_decimal_parts("18446744073709551616", "0").is_none());
    }

    #[test]
    fn test_has_any() {
        let b = PermissionSet::single(40).grant(PermissionSet::single(41));
        assert!(b.has_any(PermissionSet::single(41)));
        assert!(!b.has_any(PermissionSet::single(42)));
    }
}
