//! Canonical hashing rules shared by [`crate::key`] and [`crate::probe`].
//!
//! The whole point of this module is that a stored key and a caller's probe hash identically
//! whenever they are numerically equal, regardless of width, signedness, or whether the value
//! arrived as an integer or a float. Without this, a lookup of an `i64` would never find a
//! `u16`-backed entry of the same value.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Start a hasher with a fixed, process-independent seed so that persisted tables and freshly
/// built ones probe identically. [`DefaultHasher::new`] already uses fixed keys (unlike
/// `RandomState`), so this is mostly a named seam to hang a doc comment on.
#[inline]
fn hasher() -> DefaultHasher {
    DefaultHasher::new()
}

/// Hash a signed 64-bit integer using the canonical integer rule.
#[inline]
pub fn hash_i64(v: i64) -> u64 {
    let mut h = hasher();
    0u8.hash(&mut h); // integer-category discriminant
    v.hash(&mut h);
    h.finish()
}

/// Hash an unsigned 64-bit integer that does *not* fit in an `i64` (i.e. its top bit is set).
/// Values that do fit must go through [`hash_i64`] instead so that e.g. `20u64` and `20i64` hash
/// identically. Hashed as the unsigned 64-bit value itself (not its two's-complement `i64`
/// reinterpretation) per §4.1's "hash as an unsigned 64-bit integer" rule, under the same
/// integer-category discriminant as [`hash_i64`] so values that do fit still land in the same
/// scheme.
#[inline]
pub fn hash_u64_only(v: u64) -> u64 {
    let mut h = hasher();
    0u8.hash(&mut h); // integer-category discriminant, shared with `hash_i64`
    v.hash(&mut h);
    h.finish()
}

/// Hash any integer value given as a canonical `i64`/`u64` pair classification, dispatching to
/// the representation that actually matches a plain 64-bit integer's hash.
#[inline]
pub fn hash_integer(fits_i64: bool, as_i64: i64, as_u64: u64) -> u64 {
    if fits_i64 {
        hash_i64(as_i64)
    } else {
        hash_u64_only(as_u64)
    }
}

/// Hash a floating-point value using the canonical float rule: integral values hash as the
/// equivalent 64-bit integer, everything else hashes by bit pattern with `-0.0` folded to `0.0`.
#[inline]
pub fn hash_f64(v: f64) -> u64 {
    if v.is_finite() && v.fract() == 0.0 && v >= (i64::MIN as f64) && v < (i64::MAX as f64) {
        return hash_i64(v as i64);
    }
    let v = if v == 0.0 { 0.0 } else { v };
    let mut h = hasher();
    1u8.hash(&mut h); // float-category discriminant (only reached for non-integral/huge floats)
    v.to_bits().hash(&mut h);
    h.finish()
}

/// Hash a boolean the way the canonical scheme treats it: as the integer 0 or 1.
#[inline]
pub fn hash_bool(v: bool) -> u64 {
    hash_i64(v as i64)
}

/// Hash a fixed-width Unicode string after stripping trailing NUL code points.
#[inline]
pub fn hash_str(v: &str) -> u64 {
    let trimmed = v.trim_end_matches('\0');
    let mut h = hasher();
    trimmed.hash(&mut h);
    h.finish()
}

/// Hash a fixed-width byte string after stripping trailing zero bytes.
#[inline]
pub fn hash_bytes(v: &[u8]) -> u64 {
    let mut end = v.len();
    while end > 0 && v[end - 1] == 0 {
        end -= 1;
    }
    let mut h = hasher();
    v[..end].hash(&mut h);
    h.finish()
}

/// Hash an opaque value via its own `Hash` implementation.
#[inline]
pub fn hash_object<T: Hash + ?Sized>(v: &T) -> u64 {
    let mut h = hasher();
    v.hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_of_equal_value_hash_identically() {
        assert_eq!(hash_i64(20), hash_i64(20));
        assert_eq!(hash_integer(true, 20, 20), hash_i64(20));
    }

    #[test]
    fn float_with_integral_value_matches_integer_hash() {
        assert_eq!(hash_f64(20.0), hash_i64(20));
        assert_eq!(hash_f64(-0.0), hash_f64(0.0));
    }

    #[test]
    fn bool_matches_zero_and_one() {
        assert_eq!(hash_bool(false), hash_i64(0));
        assert_eq!(hash_bool(true), hash_i64(1));
    }

    #[test]
    fn trailing_nul_is_stripped() {
        assert_eq!(hash_str("abc\0"), hash_str("abc"));
        assert_eq!(hash_bytes(&[1, 2, 0, 0]), hash_bytes(&[1, 2]));
    }

    #[test]
    fn huge_unsigned_does_not_collide_with_small_signed_by_construction() {
        // Not a correctness requirement, just documents the split point.
        let huge = u64::MAX;
        assert_eq!(hash_integer(false, 0, huge), hash_u64_only(huge));
    }
}
