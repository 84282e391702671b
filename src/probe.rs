//! Probe Key (component B): the per-lookup caller-supplied key, normalized and hashed once.

use crate::erased::{ErasedKey, Opaque};
use crate::hash;
use crate::integer::Integer;

/// A normalized, caller-supplied lookup key.
///
/// Built once per call (see [`IntoProbeKey`]) and reused for both the hash computation and every
/// equality check along the probe sequence.
#[derive(Clone, Copy)]
pub enum ProbeKey<'a> {
    Int(Integer),
    Float(f64),
    Str(&'a str),
    Bytes(&'a [u8]),
    Object(&'a dyn ErasedKey),
}

impl<'a> ProbeKey<'a> {
    /// The canonical hash for this probe, independent of what kind of table it is probed
    /// against. A probe whose category can never match a given table is cheaply detected by
    /// comparing [`crate::kind::Kind`] before any hashing happens (see `Table::lookup`).
    pub fn hash(&self) -> u64 {
        match self {
            ProbeKey::Int(n) => hash::hash_integer(n.is_i64(), n.as_i64().unwrap_or(0), n.as_bits()),
            ProbeKey::Float(v) => hash::hash_f64(*v),
            ProbeKey::Str(s) => hash::hash_str(s),
            ProbeKey::Bytes(b) => hash::hash_bytes(b),
            ProbeKey::Object(o) => o.erased_hash(),
        }
    }

    /// `true` if this probe's category could possibly match the given kind; used to short-circuit
    /// lookups against a table of a disjoint kind without walking the probe sequence at all.
    pub fn could_match(&self, kind: crate::kind::Kind) -> bool {
        use crate::kind::Kind;
        match (self, kind) {
            (ProbeKey::Int(_) | ProbeKey::Float(_), k) => k.is_numeric(),
            (ProbeKey::Str(_), Kind::Unicode(_)) => true,
            (ProbeKey::Bytes(_), Kind::Bytes(_)) => true,
            (ProbeKey::Object(_), Kind::Object) => true,
            _ => false,
        }
    }
}

/// Converts a Rust value into a [`ProbeKey`]. Implemented for the primitive kinds a buffer-mode
/// index can store, plus [`Opaque`] for opaque-mode probing (see that type's docs for why the
/// split exists).
pub trait IntoProbeKey<'a> {
    fn into_probe_key(self) -> ProbeKey<'a>;
}

macro_rules! impl_probe_integer {
    ($t: ty) => {
        impl<'a> IntoProbeKey<'a> for $t {
            fn into_probe_key(self) -> ProbeKey<'a> {
                ProbeKey::Int(Integer::from(self))
            }
        }
    };
}

impl_probe_integer!(i8);
impl_probe_integer!(i16);
impl_probe_integer!(i32);
impl_probe_integer!(i64);
impl_probe_integer!(u8);
impl_probe_integer!(u16);
impl_probe_integer!(u32);
impl_probe_integer!(u64);

impl<'a> IntoProbeKey<'a> for bool {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Int(Integer::from(self))
    }
}

impl<'a> IntoProbeKey<'a> for f32 {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Float(self as f64)
    }
}

impl<'a> IntoProbeKey<'a> for f64 {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Float(self)
    }
}

impl<'a> IntoProbeKey<'a> for half::f16 {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Float(self.to_f64())
    }
}

impl<'a> IntoProbeKey<'a> for &'a str {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Str(self)
    }
}

impl<'a> IntoProbeKey<'a> for &'a String {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Str(self.as_str())
    }
}

impl<'a> IntoProbeKey<'a> for &'a [u8] {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Bytes(self)
    }
}

impl<'a> IntoProbeKey<'a> for &'a Vec<u8> {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Bytes(self.as_slice())
    }
}

impl<'a, const N: usize> IntoProbeKey<'a> for &'a [u8; N] {
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Bytes(self.as_slice())
    }
}

impl<'a, T> IntoProbeKey<'a> for &'a Opaque<T>
where
    T: std::hash::Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn into_probe_key(self) -> ProbeKey<'a> {
        ProbeKey::Object(&self.0 as &dyn ErasedKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;

    #[test]
    fn disjoint_categories_never_match() {
        let probe = 5i32.into_probe_key();
        assert!(!probe.could_match(Kind::Unicode(4)));
        assert!(probe.could_match(Kind::Int8));
        let probe = "x".into_probe_key();
        assert!(!probe.could_match(Kind::Int32));
    }

    #[test]
    fn int_and_float_probes_of_equal_value_hash_identically() {
        let a = 20i32.into_probe_key();
        let b = 20.0f64.into_probe_key();
        assert_eq!(a.hash(), b.hash());
    }
}
