//! Key View (component A) and the Key Store it is built from.
//!
//! A Key View is not a concrete type here; it is the behavior `KeyStore::hash_at`,
//! `KeyStore::equals_at`, and `KeyStore::materialize_at` give to one stored ordinal, whether that
//! ordinal lives in an owned opaque sequence or is sliced out of a typed buffer (borrowed, or
//! owned after a deserialize).

use std::fmt;

use crate::buffer::{self, RawBuffer};
use crate::erased::ErasedKey;
use crate::hash;
use crate::integer::Integer;
use crate::kind::Kind;
use crate::probe::ProbeKey;

/// The host-facing materialization of one stored key, reflecting the width it was actually
/// stored at (Design Note (c): an `Int8` key materializes as `i8`, not a generically promoted
/// integer).
#[derive(Debug, Clone)]
pub enum KeyValue {
    Object(Box<dyn ErasedKey>),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float16(half::f16),
    Float32(f32),
    Float64(f64),
    DateTime64(i64),
    Unicode(String),
    Bytes(Vec<u8>),
}

impl KeyValue {
    /// Re-wrap this value as an opaque, type-erased key, for use by `IndexMut::union`. Fails
    /// only for the floating-point kinds, since `f32`/`f64`/`half::f16` do not implement `Eq`.
    pub(crate) fn into_opaque(self) -> Option<Box<dyn ErasedKey>> {
        use KeyValue::*;
        match self {
            Object(b) => Some(b),
            Int8(v) => Some(Box::new(v)),
            Int16(v) => Some(Box::new(v)),
            Int32(v) => Some(Box::new(v)),
            Int64(v) => Some(Box::new(v)),
            UInt8(v) => Some(Box::new(v)),
            UInt16(v) => Some(Box::new(v)),
            UInt32(v) => Some(Box::new(v)),
            UInt64(v) => Some(Box::new(v)),
            DateTime64(v) => Some(Box::new(v)),
            Unicode(v) => Some(Box::new(v)),
            Bytes(v) => Some(Box::new(v)),
            Float16(_) | Float32(_) | Float64(_) => None,
        }
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        use KeyValue::*;
        match (self, other) {
            (Object(a), Object(b)) => a.erased_eq(b.as_ref()),
            (Int8(a), Int8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (UInt8(a), UInt8(b)) => a == b,
            (UInt16(a), UInt16(b)) => a == b,
            (UInt32(a), UInt32(b)) => a == b,
            (UInt64(a), UInt64(b)) => a == b,
            (Float16(a), Float16(b)) => a == b,
            (Float32(a), Float32(b)) => a == b,
            (Float64(a), Float64(b)) => a == b,
            (DateTime64(a), DateTime64(b)) => a == b,
            (Unicode(a), Unicode(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            _ => false,
        }
    }
}

/// A canonicalized numeric value, used internally to compare across integer/float boundaries.
#[derive(Clone, Copy)]
pub(crate) enum Number {
    Int(Integer),
    Float(f64),
}

impl Number {
    /// Re-wrap as a [`ProbeKey`] so a buffer element decoded by [`decode_number`] can itself be
    /// probed against another index — used by `Index::get_all`/`get_any`'s typed-buffer input
    /// form (§4.4, §6), which looks up one buffer's elements against another's table.
    pub(crate) fn into_probe_key<'a>(self) -> ProbeKey<'a> {
        match self {
            Number::Int(n) => ProbeKey::Int(n),
            Number::Float(f) => ProbeKey::Float(f),
        }
    }
}

/// Mathematical equality between two canonicalized numbers, per §4.1: integers compare by
/// value regardless of width/signedness; a float matches an integer only with zero fractional
/// part; `NaN` never equals anything, including another `NaN` with the same bit pattern.
fn numbers_eq(a: Number, b: Number) -> bool {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => a.math_eq(&b),
        (Number::Float(a), Number::Float(b)) => a == b,
        (Number::Int(a), Number::Float(b)) | (Number::Float(b), Number::Int(a)) => {
            b.is_finite() && b.fract() == 0.0 && a.as_f64() == b
        }
    }
}

fn number_from_probe(probe: &ProbeKey) -> Option<Number> {
    match probe {
        ProbeKey::Int(n) => Some(Number::Int(*n)),
        ProbeKey::Float(v) => Some(Number::Float(*v)),
        _ => None,
    }
}

/// The authoritative record of keys in insertion order (§3): owned opaque values, a borrowed
/// reference to an externally owned typed buffer, or an owned typed buffer reconstructed by
/// [`crate::persist`] (which cannot reborrow the original source).
pub(crate) enum KeyStore<'a> {
    Object(Vec<Box<dyn ErasedKey>>),
    Buffer(RawBuffer<'a>),
    OwnedBuffer(Kind, Vec<u8>, usize),
}

impl<'a> Clone for KeyStore<'a> {
    fn clone(&self) -> Self {
        match self {
            KeyStore::Object(v) => KeyStore::Object(v.clone()),
            KeyStore::Buffer(b) => KeyStore::Buffer(*b),
            KeyStore::OwnedBuffer(k, d, c) => KeyStore::OwnedBuffer(*k, d.clone(), *c),
        }
    }
}

impl<'a> KeyStore<'a> {
    pub fn kind(&self) -> Kind {
        match self {
            KeyStore::Object(_) => Kind::Object,
            KeyStore::Buffer(b) => b.kind(),
            KeyStore::OwnedBuffer(k, ..) => *k,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            KeyStore::Object(v) => v.len(),
            KeyStore::Buffer(b) => b.len(),
            KeyStore::OwnedBuffer(_, _, count) => *count,
        }
    }

    fn with_buffer_view<R>(&self, f: impl FnOnce(&RawBuffer) -> R) -> R {
        match self {
            KeyStore::Buffer(b) => f(b),
            KeyStore::OwnedBuffer(kind, data, count) => {
                f(&RawBuffer::from_raw_parts(*kind, data, *count))
            }
            KeyStore::Object(_) => unreachable!("object kind never backs a buffer"),
        }
    }

    /// Hash of the key under its own kind — used during insertion, where no probe is involved.
    pub fn hash_at(&self, i: usize) -> u64 {
        match self {
            KeyStore::Object(v) => v[i].erased_hash(),
            _ => self.with_buffer_view(|b| buffer_hash_at(b, i)),
        }
    }

    pub fn equals_at(&self, i: usize, probe: &ProbeKey) -> bool {
        match self {
            KeyStore::Object(v) => match probe {
                ProbeKey::Object(p) => v[i].erased_eq(*p),
                _ => false,
            },
            _ => self.with_buffer_view(|b| buffer_equals_at(b, i, probe)),
        }
    }

    /// Equality between two ordinals of this same store, used to detect duplicates while
    /// inserting directly from a buffer (the construction shortcut of §4.3).
    pub fn eq_ordinals(&self, a: usize, b: usize) -> bool {
        match self {
            KeyStore::Object(v) => v[a].erased_eq(v[b].as_ref()),
            _ => self.with_buffer_view(|buf| match buf.kind() {
                Kind::Unicode(w) => {
                    let sa = decode_unicode(buf.element_bytes(a), w);
                    let sb = decode_unicode(buf.element_bytes(b), w);
                    sa.trim_end_matches('\0') == sb.trim_end_matches('\0')
                }
                Kind::Bytes(_) => {
                    trim_trailing_zeros(buf.element_bytes(a)) == trim_trailing_zeros(buf.element_bytes(b))
                }
                _ => numbers_eq(decode_number(buf, a), decode_number(buf, b)),
            }),
        }
    }

    pub fn materialize_at(&self, i: usize) -> KeyValue {
        match self {
            KeyStore::Object(v) => KeyValue::Object(v[i].clone_box()),
            _ => self.with_buffer_view(|b| buffer_materialize_at(b, i)),
        }
    }

    /// Opaque-mode-only: append a new owned key, returning its ordinal.
    pub fn push_object(&mut self, key: Box<dyn ErasedKey>) -> usize {
        match self {
            KeyStore::Object(v) => {
                v.push(key);
                v.len() - 1
            }
            _ => unreachable!("push_object called on a buffer-mode store"),
        }
    }
}

pub(crate) fn decode_number(b: &RawBuffer, i: usize) -> Number {
    let bytes = b.element_bytes(i);
    match b.kind() {
        Kind::Int8 => Number::Int(Integer::from(bytes[0] as i8)),
        Kind::Int16 => Number::Int(Integer::from(buffer::read_i16(bytes))),
        Kind::Int32 => Number::Int(Integer::from(buffer::read_i32(bytes))),
        Kind::Int64 | Kind::DateTime64 => Number::Int(Integer::from(buffer::read_i64(bytes))),
        Kind::UInt8 => Number::Int(Integer::from(bytes[0])),
        Kind::UInt16 => Number::Int(Integer::from(buffer::read_u16(bytes))),
        Kind::UInt32 => Number::Int(Integer::from(buffer::read_u32(bytes))),
        Kind::UInt64 => Number::Int(Integer::from(buffer::read_u64(bytes))),
        Kind::Float16 => Number::Float(buffer::read_f16(bytes).to_f64()),
        Kind::Float32 => Number::Float(buffer::read_f32(bytes) as f64),
        Kind::Float64 => Number::Float(buffer::read_f64(bytes)),
        Kind::Unicode(_) | Kind::Bytes(_) | Kind::Object => {
            unreachable!("decode_number only called for numeric kinds")
        }
    }
}

fn buffer_hash_at(b: &RawBuffer, i: usize) -> u64 {
    match b.kind() {
        Kind::Unicode(w) => hash::hash_str(&decode_unicode(b.element_bytes(i), w)),
        Kind::Bytes(_) => hash::hash_bytes(b.element_bytes(i)),
        Kind::Object => unreachable!("object kind never backs a buffer"),
        _ => match decode_number(b, i) {
            Number::Int(n) => hash::hash_integer(n.is_i64(), n.as_i64().unwrap_or(0), n.as_bits()),
            Number::Float(f) => hash::hash_f64(f),
        },
    }
}

fn buffer_equals_at(b: &RawBuffer, i: usize, probe: &ProbeKey) -> bool {
    match b.kind() {
        Kind::Unicode(w) => match probe {
            ProbeKey::Str(p) => {
                decode_unicode(b.element_bytes(i), w).trim_end_matches('\0') == p.trim_end_matches('\0')
            }
            _ => false,
        },
        Kind::Bytes(_) => match probe {
            ProbeKey::Bytes(p) => trim_trailing_zeros(b.element_bytes(i)) == trim_trailing_zeros(p),
            _ => false,
        },
        Kind::Object => unreachable!("object kind never backs a buffer"),
        _ => match number_from_probe(probe) {
            Some(n) => numbers_eq(decode_number(b, i), n),
            None => false,
        },
    }
}

fn trim_trailing_zeros(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && data[end - 1] == 0 {
        end -= 1;
    }
    &data[..end]
}

pub(crate) fn decode_unicode(bytes: &[u8], width: usize) -> String {
    let mut s = String::with_capacity(width);
    for chunk in bytes.chunks_exact(4).take(width) {
        let code = buffer::read_u32(chunk);
        if code == 0 {
            break;
        }
        if let Some(c) = char::from_u32(code) {
            s.push(c);
        }
    }
    s
}

fn buffer_materialize_at(b: &RawBuffer, i: usize) -> KeyValue {
    let bytes = b.element_bytes(i);
    match b.kind() {
        Kind::Int8 => KeyValue::Int8(bytes[0] as i8),
        Kind::Int16 => KeyValue::Int16(buffer::read_i16(bytes)),
        Kind::Int32 => KeyValue::Int32(buffer::read_i32(bytes)),
        Kind::Int64 => KeyValue::Int64(buffer::read_i64(bytes)),
        Kind::UInt8 => KeyValue::UInt8(bytes[0]),
        Kind::UInt16 => KeyValue::UInt16(buffer::read_u16(bytes)),
        Kind::UInt32 => KeyValue::UInt32(buffer::read_u32(bytes)),
        Kind::UInt64 => KeyValue::UInt64(buffer::read_u64(bytes)),
        Kind::Float16 => KeyValue::Float16(buffer::read_f16(bytes)),
        Kind::Float32 => KeyValue::Float32(buffer::read_f32(bytes)),
        Kind::Float64 => KeyValue::Float64(buffer::read_f64(bytes)),
        Kind::DateTime64 => KeyValue::DateTime64(buffer::read_i64(bytes)),
        Kind::Unicode(w) => KeyValue::Unicode(decode_unicode(bytes, w)),
        Kind::Bytes(_) => KeyValue::Bytes(bytes.to_vec()),
        Kind::Object => unreachable!("object kind never backs a buffer"),
    }
}

impl fmt::Debug for KeyStore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyStore::Object(v) => f.debug_tuple("Object").field(&v.len()).finish(),
            KeyStore::Buffer(b) => f
                .debug_struct("Buffer")
                .field("kind", &b.kind())
                .field("len", &b.len())
                .finish(),
            KeyStore::OwnedBuffer(k, _, count) => f
                .debug_struct("OwnedBuffer")
                .field("kind", k)
                .field("len", count)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::IntoProbeKey;

    #[test]
    fn cross_width_int_probe_matches_buffer_element() {
        let data = [1i8, 5, 10, 20];
        let buf: RawBuffer = (&data[..]).into();
        let store = KeyStore::Buffer(buf);
        let probe = 20.0f64.into_probe_key();
        assert!(store.equals_at(3, &probe));
        let probe = true.into_probe_key();
        assert!(store.equals_at(0, &probe));
    }

    #[test]
    fn trailing_nul_strings_match() {
        let mut bytes = Vec::new();
        for c in [b'a' as u32, b'b' as u32, b'c' as u32, 0] {
            bytes.extend_from_slice(&c.to_ne_bytes());
        }
        let buf = RawBuffer::from_raw_parts(Kind::Unicode(4), &bytes, 1);
        let store = KeyStore::Buffer(buf);
        let probe = "abc".into_probe_key();
        assert!(store.equals_at(0, &probe));
        let probe = "abc\0".into_probe_key();
        assert!(store.equals_at(0, &probe));
    }

    #[test]
    fn nan_never_equals_nan() {
        let data = [f64::NAN, 1.0];
        let buf: RawBuffer = (&data[..]).into();
        let store = KeyStore::Buffer(buf);
        assert!(!store.eq_ordinals(0, 0));
    }
}
