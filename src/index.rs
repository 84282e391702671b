//! The public surface (component D): [`Index`], a frozen index over either opaque keys or a
//! borrowed typed buffer, and [`IndexMut`], a growable opaque-mode-only index.

use std::fmt;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::buffer::{RawBuffer, RawBufferProvider};
use crate::erased::ErasedKey;
use crate::error::{Error, Result};
use crate::key::{self, KeyStore, KeyValue};
use crate::kind::Kind;
use crate::probe::{IntoProbeKey, ProbeKey};
use crate::table::Table;

/// Shared lookup/iteration machinery for both [`Index`] and [`IndexMut`]. Kept private: the two
/// public types differ in what mutation they allow, not in how a lookup works.
struct Core<'a> {
    table: Table,
    store: KeyStore<'a>,
}

impl<'a> Clone for Core<'a> {
    fn clone(&self) -> Self {
        Core {
            table: self.table.clone(),
            store: self.store.clone(),
        }
    }
}

impl<'a> fmt::Debug for Core<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Core")
            .field("kind", &self.store.kind())
            .field("len", &self.table.len())
            .finish()
    }
}

impl<'a> Core<'a> {
    fn len(&self) -> usize {
        self.table.len()
    }

    fn kind(&self) -> Kind {
        self.store.kind()
    }

    fn get(&self, probe: &ProbeKey) -> Option<i64> {
        if !probe.could_match(self.store.kind()) {
            return None;
        }
        let hash = probe.hash();
        self.table.lookup(hash, |ordinal| self.store.equals_at(ordinal as usize, probe))
    }

    /// Append `key` if absent, returning `(ordinal, true)`; if present, `(ordinal, false)` and
    /// nothing is mutated.
    fn add_erased(&mut self, key: Box<dyn ErasedKey>) -> (i64, bool) {
        let hash = key.erased_hash();
        if let KeyStore::Object(v) = &self.store {
            if let Some(existing) = self.table.lookup(hash, |ord| v[ord as usize].erased_eq(key.as_ref())) {
                return (existing, false);
            }
        } else {
            unreachable!("add_erased only ever called on an opaque-mode store");
        }
        let ordinal = self.store.push_object(key) as i64;
        let store = &self.store;
        self.table.insert(hash, ordinal, |_| false, |ord| store.hash_at(ord as usize));
        (ordinal, true)
    }
}

/// A lazily-iterated, restartable view over an index's keys in insertion order (§7).
pub struct Keys<'i, 'a> {
    core: &'i Core<'a>,
    pos: usize,
}

impl<'i, 'a> Iterator for Keys<'i, 'a> {
    type Item = KeyValue;

    fn next(&mut self) -> Option<KeyValue> {
        if self.pos >= self.core.len() {
            return None;
        }
        let v = self.core.store.materialize_at(self.pos);
        self.pos += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.core.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl<'i, 'a> ExactSizeIterator for Keys<'i, 'a> {}

/// A lazily-iterated, restartable view over an index's `(key, ordinal)` pairs in insertion order.
pub struct Items<'i, 'a> {
    core: &'i Core<'a>,
    pos: usize,
}

impl<'i, 'a> Iterator for Items<'i, 'a> {
    type Item = (KeyValue, i64);

    fn next(&mut self) -> Option<(KeyValue, i64)> {
        if self.pos >= self.core.len() {
            return None;
        }
        let v = self.core.store.materialize_at(self.pos);
        let ordinal = self.pos as i64;
        self.pos += 1;
        Some((v, ordinal))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.core.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl<'i, 'a> ExactSizeIterator for Items<'i, 'a> {}

/// Walk every element of a freshly built buffer-mode store, inserting it and rejecting the first
/// duplicate found — the construction shortcut of §4.3, shared by borrowed and owned buffers.
fn build_buffer_backed(store: KeyStore<'_>) -> Result<Core<'_>> {
    let kind = store.kind();
    let table = Table::with_capacity_hint(store.len());
    let starting_capacity = table.capacity();
    let mut core = Core { table, store };
    for i in 0..core.store.len() {
        let hash = core.store.hash_at(i);
        let store = &core.store;
        let dup = core.table.insert(
            hash,
            i as i64,
            |existing| store.eq_ordinals(existing as usize, i),
            |ord| store.hash_at(ord as usize),
        );
        if let Some(existing) = dup {
            trace!(ordinal = existing, %kind, "duplicate key rejected during buffer-mode construction");
            return Err(Error::NonUnique { ordinal: existing });
        }
    }
    debug!(%kind, len = core.len(), starting_capacity, "built buffer-mode index");
    Ok(core)
}

/// An immutable ordinal-assigning index, accepting either opaque keys or a borrowed typed buffer
/// (§4.2, §4.3).
pub struct Index<'a>(Core<'a>);

impl<'a> Clone for Index<'a> {
    fn clone(&self) -> Self {
        Index(self.0.clone())
    }
}

impl<'a> fmt::Debug for Index<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Index").field(&self.0).finish()
    }
}

impl<'a> Index<'a> {
    /// Build an opaque-mode index from an iterable of hashable, owned keys. Fails with
    /// [`Error::NonUnique`] the first time a repeated key is seen, naming the ordinal already
    /// assigned to it.
    pub fn from_opaque_iter<T, I>(iter: I) -> Result<Index<'static>>
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let into_iter = iter.into_iter();
        let table = Table::new();
        let starting_capacity = table.capacity();
        let mut core = Core {
            table,
            store: KeyStore::Object(Vec::new()),
        };
        for key in into_iter {
            let boxed: Box<dyn ErasedKey> = Box::new(key);
            let (ordinal, inserted) = core.add_erased(boxed);
            if !inserted {
                trace!(ordinal, "duplicate key rejected during opaque-mode construction");
                return Err(Error::NonUnique { ordinal });
            }
        }
        debug!(kind = %Kind::Object, len = core.len(), starting_capacity, "built opaque-mode index");
        Ok(Index(core))
    }

    /// Build a buffer-mode index directly over an already-validated [`RawBuffer`] (zero-copy:
    /// the buffer's bytes are borrowed, not copied). Fails with [`Error::NonUnique`] if the
    /// buffer contains a repeated key.
    pub fn from_buffer(buffer: RawBuffer<'a>) -> Result<Index<'a>> {
        let core = build_buffer_backed(KeyStore::Buffer(buffer))?;
        Ok(Index(core))
    }

    /// Validate `provider` and build a buffer-mode index over it in one step.
    pub fn from_provider<P: RawBufferProvider>(provider: &'a P) -> Result<Index<'a>> {
        Index::from_buffer(RawBuffer::from_provider(provider)?)
    }

    /// Like [`Index::from_buffer`], but takes ownership of the backing bytes instead of
    /// borrowing them. Used by [`crate::persist::from_bytes`], which has nothing left to borrow
    /// from once the source byte string goes out of scope.
    pub(crate) fn from_owned_buffer(kind: Kind, data: Vec<u8>, count: usize) -> Result<Index<'static>> {
        let core = build_buffer_backed(KeyStore::OwnedBuffer(kind, data, count))?;
        Ok(Index(core))
    }

    /// Copy another index's keys into a new, independent index of the same mode.
    pub fn from_index(other: &Index<'a>) -> Index<'a> {
        other.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }

    /// The fixed element representation of this index's keys.
    pub fn kind(&self) -> Kind {
        self.0.kind()
    }

    /// The ordinal assigned to `key`, or `None` if it was never inserted.
    pub fn get<Q: IntoProbeKey<'a>>(&self, key: Q) -> Option<i64> {
        self.0.get(&key.into_probe_key())
    }

    pub fn contains<Q: IntoProbeKey<'a>>(&self, key: Q) -> bool {
        self.get(key).is_some()
    }

    /// Like [`Index::get`], but raises [`Error::KeyMissing`] instead of returning `None`.
    pub fn index_of<Q: IntoProbeKey<'a>>(&self, key: Q) -> Result<i64> {
        self.get(key).ok_or(Error::KeyMissing)
    }

    /// Look up every key in `keys`, failing the whole call with [`Error::KeyMissing`] (and no
    /// partial output) the first time one is absent. `keys` must be a sized sequence — Rust's
    /// `ExactSizeIterator` bound enforces that statically, in place of a runtime type-mismatch
    /// check.
    pub fn get_all<Q, I>(&self, keys: I) -> Result<PositionBuffer>
    where
        Q: IntoProbeKey<'a>,
        I: IntoIterator<Item = Q>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = keys.into_iter();
        let mut out = Vec::with_capacity(iter.len());
        for k in iter {
            out.push(self.index_of(k)?);
        }
        Ok(PositionBuffer(out))
    }

    /// Look up every key in `keys`, skipping the ones that are absent and never raising. The
    /// result is deduplicated by ordinal and preserves first-occurrence order.
    pub fn get_any<Q, I>(&self, keys: I) -> Vec<i64>
    where
        Q: IntoProbeKey<'a>,
        I: IntoIterator<Item = Q>,
    {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for k in keys {
            if let Some(ordinal) = self.get(k) {
                if seen.insert(ordinal) {
                    out.push(ordinal);
                }
            }
        }
        out
    }

    /// The typed-buffer input form of [`Index::get_all`] (§4.4, §6: `get_all(seq)` accepts "a
    /// sized sequence … or a 1-D typed buffer"). Validates `keys` the same way buffer-mode
    /// construction does, then looks up each of its elements in turn, failing the whole call with
    /// [`Error::KeyMissing`] (and no partial output) on the first absence.
    pub fn get_all_buffer<P: RawBufferProvider>(&self, keys: &P) -> Result<PositionBuffer> {
        let buf = RawBuffer::from_provider(keys)?;
        let mut out = Vec::with_capacity(buf.len());
        for i in 0..buf.len() {
            let ordinal = self
                .get_buffer_element(&buf, i)
                .ok_or(Error::KeyMissing)?;
            out.push(ordinal);
        }
        Ok(PositionBuffer(out))
    }

    /// The typed-buffer input form of [`Index::get_any`] (§4.4, §6). Never raises on an absent
    /// key; the result is deduplicated by ordinal and preserves first-occurrence order.
    pub fn get_any_buffer<P: RawBufferProvider>(&self, keys: &P) -> Result<Vec<i64>> {
        let buf = RawBuffer::from_provider(keys)?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for i in 0..buf.len() {
            if let Some(ordinal) = self.get_buffer_element(&buf, i) {
                if seen.insert(ordinal) {
                    out.push(ordinal);
                }
            }
        }
        Ok(out)
    }

    /// Probe this index with element `i` of `buf`, without allocating beyond the owned `String`
    /// a `Unicode` element must be decoded into before it can be compared.
    fn get_buffer_element(&self, buf: &RawBuffer, i: usize) -> Option<i64> {
        match buf.kind() {
            Kind::Unicode(w) => {
                let s = key::decode_unicode(buf.element_bytes(i), w);
                self.0.get(&ProbeKey::Str(&s))
            }
            Kind::Bytes(_) => self.0.get(&ProbeKey::Bytes(buf.element_bytes(i))),
            Kind::Object => unreachable!("object kind never backs a typed buffer"),
            _ => self.0.get(&key::decode_number(buf, i).into_probe_key()),
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Keys<'_, 'a> {
        Keys { core: &self.0, pos: 0 }
    }

    /// Ordinals in insertion order — by construction, always `0..self.len()`.
    pub fn values(&self) -> std::ops::Range<i64> {
        0..self.len() as i64
    }

    /// `(key, ordinal)` pairs in insertion order.
    pub fn items(&self) -> Items<'_, 'a> {
        Items { core: &self.0, pos: 0 }
    }

    pub(crate) fn store(&self) -> &KeyStore<'a> {
        &self.0.store
    }
}

impl<'a> PartialEq for Index<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }
}

/// An append-only, opaque-mode-only index (§4.4). Unlike [`Index`], a buffer never backs an
/// `IndexMut`: an externally owned typed buffer has a fixed length, so there is nothing for
/// `add`/`update` to append into.
pub struct IndexMut(Core<'static>);

impl Clone for IndexMut {
    fn clone(&self) -> Self {
        IndexMut(self.0.clone())
    }
}

impl fmt::Debug for IndexMut {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("IndexMut").field(&self.0).finish()
    }
}

impl IndexMut {
    pub fn new() -> Self {
        let table = Table::new();
        debug!(kind = %Kind::Object, len = 0, starting_capacity = table.capacity(), "built opaque-mode index");
        IndexMut(Core {
            table,
            store: KeyStore::Object(Vec::new()),
        })
    }

    /// Build from an iterable of owned keys; fails on the first duplicate, same as
    /// [`Index::from_opaque_iter`].
    pub fn from_opaque_iter<T, I>(iter: I) -> Result<Self>
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let mut m = IndexMut::new();
        for key in iter {
            m.add(key)?;
        }
        debug!(
            kind = %Kind::Object,
            len = m.len(),
            starting_capacity = m.0.table.capacity(),
            "built opaque-mode index"
        );
        Ok(m)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }

    pub fn kind(&self) -> Kind {
        Kind::Object
    }

    pub fn get<'q, T>(&self, key: &'q T) -> Option<i64>
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        self.0.get(&ProbeKey::Object(key as &dyn ErasedKey))
    }

    pub fn contains<T>(&self, key: &T) -> bool
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        self.get(key).is_some()
    }

    pub fn index_of<T>(&self, key: &T) -> Result<i64>
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        self.get(key).ok_or(Error::KeyMissing)
    }

    /// Insert `key`, returning its newly assigned ordinal. Fails with [`Error::NonUnique`]
    /// (naming the existing ordinal) if `key` is already present; nothing is mutated in that case.
    pub fn add<T>(&mut self, key: T) -> Result<i64>
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    {
        let boxed: Box<dyn ErasedKey> = Box::new(key);
        let (ordinal, inserted) = self.0.add_erased(boxed);
        if inserted {
            Ok(ordinal)
        } else {
            trace!(ordinal, "duplicate key rejected by add");
            Err(Error::NonUnique { ordinal })
        }
    }

    /// Insert every key in `iter` via [`IndexMut::add`], stopping at the first duplicate. Keys
    /// before the failing one remain inserted (this is a sequence of independent `add` calls,
    /// not a transaction).
    pub fn update<T, I>(&mut self, iter: I) -> Result<()>
    where
        T: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        for key in iter {
            self.add(key)?;
        }
        Ok(())
    }

    /// A new `IndexMut` holding this index's keys followed by `other`'s keys that are not
    /// already present, in `other`'s insertion order. Fails with [`Error::TypeMismatch`] if
    /// `other` is a floating-point buffer index, since `f32`/`f64`/`half::f16` keys cannot be
    /// made opaque (they do not implement `Eq`).
    pub fn try_union(&self, other: &Index<'_>) -> Result<IndexMut> {
        let mut result = self.clone();
        for kv in other.keys() {
            let boxed = kv
                .into_opaque()
                .ok_or_else(|| Error::TypeMismatch("cannot union a floating-point buffer index".to_string()))?;
            result.0.add_erased(boxed);
        }
        Ok(result)
    }

    pub fn keys(&self) -> Keys<'_, 'static> {
        Keys { core: &self.0, pos: 0 }
    }

    pub fn values(&self) -> std::ops::Range<i64> {
        0..self.len() as i64
    }

    pub fn items(&self) -> Items<'_, 'static> {
        Items { core: &self.0, pos: 0 }
    }

    pub(crate) fn store(&self) -> &KeyStore<'static> {
        &self.0.store
    }
}

impl Default for IndexMut {
    fn default() -> Self {
        IndexMut::new()
    }
}

impl PartialEq for IndexMut {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }
}

/// `lhs | rhs` is [`IndexMut::try_union`], panicking instead of returning a `Result` when `rhs`
/// is a floating-point buffer index. Use [`IndexMut::try_union`] directly to handle that case.
impl std::ops::BitOr<&Index<'_>> for &IndexMut {
    type Output = IndexMut;

    fn bitor(self, rhs: &Index<'_>) -> IndexMut {
        self.try_union(rhs)
            .expect("union with a floating-point buffer index is not supported; use try_union")
    }
}

impl std::ops::BitOr<&IndexMut> for &IndexMut {
    type Output = IndexMut;

    fn bitor(self, rhs: &IndexMut) -> IndexMut {
        let mut result = self.clone();
        for kv in rhs.keys() {
            let boxed = kv.into_opaque().expect("IndexMut keys are always opaque and hashable");
            result.0.add_erased(boxed);
        }
        result
    }
}

/// An owned, immutable sequence of 64-bit ordinals: the return type of [`Index::get_all`], and
/// itself a [`RawBufferProvider`] of kind [`Kind::Int64`] so it can flow back out through the
/// same typed-buffer contract used to build buffer-mode indices.
pub struct PositionBuffer(Vec<i64>);

impl PositionBuffer {
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<i64> {
        self.0
    }
}

impl std::ops::Deref for PositionBuffer {
    type Target = [i64];

    fn deref(&self) -> &[i64] {
        &self.0
    }
}

impl fmt::Debug for PositionBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("PositionBuffer").field(&self.0).finish()
    }
}

// SAFETY: `bytes()` reinterprets an owned, never-mutated `Vec<i64>` as bytes; the buffer outlives
// any borrow taken through this trait because it is borrowed from `&self`.
unsafe impl RawBufferProvider for PositionBuffer {
    fn kind(&self) -> Kind {
        Kind::Int64
    }

    fn element_width(&self) -> usize {
        8
    }

    fn element_count(&self) -> usize {
        self.0.len()
    }

    fn ndim(&self) -> usize {
        1
    }

    fn is_writeable(&self) -> bool {
        false
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.0.as_ptr() as *const u8, std::mem::size_of_val(self.0.as_slice())) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erased::Opaque;

    #[test]
    fn opaque_index_builds_and_looks_up_in_insertion_order() {
        let idx = Index::from_opaque_iter(["a", "b", "c"]).unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.get(&Opaque("b")), Some(1));
        assert_eq!(idx.get(&Opaque("z")), None);
        let collected: Vec<_> = idx.values().collect();
        assert_eq!(collected, vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_opaque_key_fails_construction() {
        let err = Index::from_opaque_iter(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, Error::NonUnique { ordinal: 0 }));
    }

    #[test]
    fn buffer_index_matches_cross_kind_probes() {
        let data = [1i8, 5, 10, 20];
        let buf: RawBuffer = (&data[..]).into();
        let idx = Index::from_buffer(buf).unwrap();
        assert_eq!(idx.get(20.0f64), Some(3));
        assert_eq!(idx.get(true), Some(0));
        assert_eq!(idx.get(2i32), None);
    }

    #[test]
    fn get_all_fails_atomically_on_missing_key() {
        let data = [1i32, 5, 10];
        let buf: RawBuffer = (&data[..]).into();
        let idx = Index::from_buffer(buf).unwrap();
        assert!(idx.get_all([1i32, 999]).is_err());
        let ok = idx.get_all([10i32, 1, 5]).unwrap();
        assert_eq!(ok.as_slice(), &[2, 0, 1]);
    }

    #[test]
    fn get_any_dedups_by_ordinal_and_skips_missing() {
        let data = [1i32, 5, 10];
        let buf: RawBuffer = (&data[..]).into();
        let idx = Index::from_buffer(buf).unwrap();
        let found = idx.get_any([1i32, 999, 1, 5]);
        assert_eq!(found, vec![0, 1]);
    }

    struct Int32Provider<'a>(&'a [i32]);
    unsafe impl<'a> RawBufferProvider for Int32Provider<'a> {
        fn kind(&self) -> Kind {
            Kind::Int32
        }
        fn element_width(&self) -> usize {
            4
        }
        fn element_count(&self) -> usize {
            self.0.len()
        }
        fn ndim(&self) -> usize {
            1
        }
        fn is_writeable(&self) -> bool {
            false
        }
        fn bytes(&self) -> &[u8] {
            unsafe { std::slice::from_raw_parts(self.0.as_ptr() as *const u8, self.0.len() * 4) }
        }
    }

    #[test]
    fn get_all_buffer_accepts_a_typed_probe_buffer() {
        let data = [1i32, 100, 300, 4000];
        let buf: RawBuffer = (&data[..]).into();
        let idx = Index::from_buffer(buf).unwrap();

        let probes = [300i32, 100];
        let positions = idx.get_all_buffer(&Int32Provider(&probes)).unwrap();
        assert_eq!(positions.as_slice(), &[2, 1]);

        let misses = [300i32, 999];
        assert!(idx.get_all_buffer(&Int32Provider(&misses)).is_err());
    }

    #[test]
    fn get_any_buffer_dedups_and_skips_missing() {
        let data = [1i32, 5, 10];
        let buf: RawBuffer = (&data[..]).into();
        let idx = Index::from_buffer(buf).unwrap();

        let probes = [1i32, 999, 1, 5];
        let found = idx.get_any_buffer(&Int32Provider(&probes)).unwrap();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn index_mut_add_and_union() {
        let mut a = IndexMut::new();
        a.add("x".to_string()).unwrap();
        a.add("y".to_string()).unwrap();
        let b = Index::from_opaque_iter(["y".to_string(), "z".to_string()]).unwrap();
        let merged = &a | &b;
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&"z".to_string()), Some(2));
    }

    #[test]
    fn add_duplicate_reports_existing_ordinal_without_mutating() {
        let mut a = IndexMut::new();
        a.add(1i32).unwrap();
        let err = a.add(1i32).unwrap_err();
        assert!(matches!(err, Error::NonUnique { ordinal: 0 }));
        assert_eq!(a.len(), 1);
    }
}
