//! Persistence (component E, §4.5): a compact binary encoding of a buffer-mode index, plus
//! generic helpers for opaque-mode indices.
//!
//! `Index`/`IndexMut` erase the concrete type of an opaque key so that one non-generic table
//! implementation serves both modes (see `erased.rs`). That erasure means a buffer-mode index
//! can be serialized generically by [`to_bytes`], but an opaque (`Object`-kind) one cannot —
//! there is no `Serialize` impl left to call once the type is gone. [`save_opaque_iter`] and
//! [`load_opaque`] recover that by taking the concrete key type as an explicit generic
//! parameter instead of reading it off the index.
//!
//! Wire format: `version(1) | kind_tag(1) | width_param(4, LE) | count(8, LE) | payload`. For a
//! buffer-mode index, `payload` is the raw element bytes, native-endian exactly as stored in
//! memory (matching `buffer.rs`'s `NativeEndian` reads, so round-tripping on the same machine is
//! exact). For an opaque-mode index, `payload` is a `bincode` encoding of the key sequence.

use std::hash::Hash;

use byteorder::{ByteOrder, LittleEndian};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::buffer::RawBuffer;
use crate::error::{Error, Result};
use crate::index::{Index, IndexMut};
use crate::key::KeyStore;
use crate::kind::{wire, Kind};

const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 14;

fn kind_width_param(kind: Kind) -> u32 {
    match kind {
        Kind::Unicode(w) | Kind::Bytes(w) => w as u32,
        _ => 0,
    }
}

fn kind_from_wire(tag: u8, width_param: u32) -> Result<Kind> {
    let width = width_param as usize;
    Ok(match tag {
        wire::OBJECT => Kind::Object,
        wire::INT8 => Kind::Int8,
        wire::INT16 => Kind::Int16,
        wire::INT32 => Kind::Int32,
        wire::INT64 => Kind::Int64,
        wire::UINT8 => Kind::UInt8,
        wire::UINT16 => Kind::UInt16,
        wire::UINT32 => Kind::UInt32,
        wire::UINT64 => Kind::UInt64,
        wire::FLOAT16 => Kind::Float16,
        wire::FLOAT32 => Kind::Float32,
        wire::FLOAT64 => Kind::Float64,
        wire::DATETIME64 => Kind::DateTime64,
        wire::UNICODE => Kind::Unicode(width),
        wire::BYTES => Kind::Bytes(width),
        other => return Err(Error::BadEncode(format!("unknown kind tag {}", other))),
    })
}

fn write_header(out: &mut Vec<u8>, tag: u8, width_param: u32, count: u64) {
    out.push(FORMAT_VERSION);
    out.push(tag);
    let mut param = [0u8; 4];
    LittleEndian::write_u32(&mut param, width_param);
    out.extend_from_slice(&param);
    let mut count_bytes = [0u8; 8];
    LittleEndian::write_u64(&mut count_bytes, count);
    out.extend_from_slice(&count_bytes);
}

fn read_header(bytes: &[u8]) -> Result<(u8, u32, u64)> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::BadEncode("truncated header".to_string()));
    }
    if bytes[0] != FORMAT_VERSION {
        return Err(Error::BadEncode(format!("unsupported format version {}", bytes[0])));
    }
    let tag = bytes[1];
    let width_param = LittleEndian::read_u32(&bytes[2..6]);
    let count = LittleEndian::read_u64(&bytes[6..14]);
    Ok((tag, width_param, count))
}

/// Serialize a buffer-mode index to a compact byte string (§4.5).
///
/// Fails with [`Error::TypeMismatch`] for an opaque (`Object`-kind) index; use
/// [`save_opaque_iter`] for those.
pub fn to_bytes(index: &Index) -> Result<Vec<u8>> {
    let kind = index.kind();
    let width = kind.element_width().ok_or_else(|| {
        Error::TypeMismatch("cannot persist an opaque-mode index this way; use save_opaque_iter".to_string())
    })?;
    let mut out = Vec::with_capacity(HEADER_LEN + index.len() * width);
    write_header(&mut out, kind.wire_tag(), kind_width_param(kind), index.len() as u64);
    match index.store() {
        KeyStore::Buffer(b) => append_buffer_bytes(&mut out, b),
        KeyStore::OwnedBuffer(k, data, n) => append_buffer_bytes(&mut out, &RawBuffer::from_raw_parts(*k, data, *n)),
        KeyStore::Object(_) => unreachable!("checked by element_width above"),
    }
    debug!(%kind, len = index.len(), bytes = out.len(), "serialized index");
    Ok(out)
}

fn append_buffer_bytes(out: &mut Vec<u8>, buf: &RawBuffer) {
    for i in 0..buf.len() {
        out.extend_from_slice(buf.element_bytes(i));
    }
}

/// Reconstruct a buffer-mode index previously written by [`to_bytes`].
///
/// The reconstructed index owns its bytes (it cannot reborrow whatever buffer produced the
/// original), so it is always `'static`.
pub fn from_bytes(bytes: &[u8]) -> Result<Index<'static>> {
    let (tag, width_param, count) = read_header(bytes)?;
    let kind = kind_from_wire(tag, width_param)?;
    let count = count as usize;
    let width = kind
        .element_width()
        .ok_or_else(|| Error::BadEncode("object kind cannot appear in a persisted buffer".to_string()))?;
    let data = &bytes[HEADER_LEN..];
    if data.len() != width * count {
        return Err(Error::BadEncode(format!(
            "payload length {} does not match {} elements of width {}",
            data.len(),
            count,
            width
        )));
    }
    debug!(%kind, len = count, "deserializing index");
    Index::from_owned_buffer(kind, data.to_vec(), count)
}

/// Serialize an explicit, caller-supplied sequence of opaque keys, in insertion order, via
/// `bincode`. The natural way to call this is with the same sequence an `IndexMut`/`Index` was
/// built from, since the index itself no longer carries `T`.
pub fn save_opaque_iter<'k, T, I>(keys: I) -> Result<Vec<u8>>
where
    T: Serialize + 'k,
    I: IntoIterator<Item = &'k T>,
{
    let items: Vec<&T> = keys.into_iter().collect();
    let mut out = Vec::new();
    write_header(&mut out, wire::OBJECT, 0, items.len() as u64);
    let payload = bincode::serialize(&items)?;
    out.extend_from_slice(&payload);
    debug!(len = items.len(), bytes = out.len(), "serialized opaque index");
    Ok(out)
}

/// Reconstruct an `IndexMut` of concrete key type `T` previously written by
/// [`save_opaque_iter`]. Fails with [`Error::NonUnique`] if the encoded bytes somehow contain a
/// duplicate (a stream produced by this crate never does; this only guards against
/// hand-corrupted input).
pub fn load_opaque<T>(bytes: &[u8]) -> Result<IndexMut>
where
    T: DeserializeOwned + Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    let (tag, _, _) = read_header(bytes)?;
    if tag != wire::OBJECT {
        return Err(Error::BadEncode("payload is not an opaque-mode index".to_string()));
    }
    let keys: Vec<T> = bincode::deserialize(&bytes[HEADER_LEN..])?;
    let mut index = IndexMut::new();
    index.update(keys)?;
    debug!(len = index.len(), "deserialized opaque index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wires up a real subscriber so the `debug!` calls this module emits (§4.8) at least run
    /// through a live dispatcher once, instead of only ever hitting the no-op default.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[test]
    fn buffer_index_round_trips_through_bytes() {
        init_tracing();
        let data = [1i32, 5, 10, 20];
        let buf: RawBuffer = (&data[..]).into();
        let idx = Index::from_buffer(buf).unwrap();
        let bytes = to_bytes(&idx).unwrap();
        let restored = from_bytes(&bytes).unwrap();
        assert_eq!(restored.len(), idx.len());
        assert_eq!(restored.get(10i32), Some(2));
        assert_eq!(restored.kind(), Kind::Int32);
    }

    #[test]
    fn string_index_round_trips_through_bytes() {
        let mut bytes = Vec::new();
        for word in ["cat", "dog", "emu"] {
            for c in word.chars().map(|c| c as u32).chain(std::iter::repeat(0)).take(4) {
                bytes.extend_from_slice(&c.to_ne_bytes());
            }
        }
        let buf = RawBuffer::from_raw_parts(Kind::Unicode(4), &bytes, 3);
        let idx = Index::from_buffer(buf).unwrap();
        let encoded = to_bytes(&idx).unwrap();
        let restored = from_bytes(&encoded).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.get("dog"), Some(1));
    }

    #[test]
    fn opaque_index_round_trips_by_concrete_type() {
        let bytes = save_opaque_iter(["alice".to_string(), "bob".to_string()].iter()).unwrap();
        let restored: IndexMut = load_opaque::<String>(&bytes).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&"bob".to_string()), Some(1));
    }

    #[test]
    fn bad_version_byte_is_rejected() {
        let bytes = vec![9u8, wire::INT32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(from_bytes(&bytes), Err(Error::BadEncode(_))));
    }
}
