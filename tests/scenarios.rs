//! End-to-end scenarios exercising the public surface together, one per concrete case this
//! crate's behavior is specified against.

use ordinal_index::{ErasedKey, Error, Index, IndexMut, KeyValue, Opaque, RawBuffer, RawBufferProvider};

#[test]
fn string_index_builds_and_iterates_in_order() {
    let idx = Index::from_opaque_iter(["a", "b", "c"]).unwrap();
    assert_eq!(idx.get(&Opaque("b")), Some(1));
    let items: Vec<_> = idx.items().map(|(k, v)| (k, v)).collect();
    match &items[..] {
        [(KeyValue::Object(a), 0), (KeyValue::Object(b), 1), (KeyValue::Object(c), 2)] => {
            assert_eq!(a.as_any().downcast_ref::<&str>(), Some(&"a"));
            assert_eq!(b.as_any().downcast_ref::<&str>(), Some(&"b"));
            assert_eq!(c.as_any().downcast_ref::<&str>(), Some(&"c"));
        }
        other => panic!("unexpected items: {other:?}"),
    }
}

#[test]
fn int8_buffer_matches_cross_kind_and_boolean_probes() {
    let data = [1i8, 5, 10, 20];
    let buf: RawBuffer = (&data[..]).into();
    let idx = Index::from_buffer(buf).unwrap();
    assert_eq!(idx.get(20.0f64), Some(3));
    assert_eq!(idx.get(20.1f64), None);
    assert_eq!(idx.get(true), Some(0));
}

#[test]
fn signed_int8_buffer_matches_float_probes_of_same_value() {
    let data = [-2i8, -1, 1, 2];
    let buf: RawBuffer = (&data[..]).into();
    let idx = Index::from_buffer(buf).unwrap();
    assert!(idx.contains(-2i32));
    assert!(idx.contains(2i32));
    assert!(idx.contains(-2.0f64));
    assert!(idx.contains(2.0f64));
}

#[test]
fn float_buffer_matches_boolean_probe() {
    let data = [0.0f64, 1.0, 2.0];
    let buf: RawBuffer = (&data[..]).into();
    let idx = Index::from_buffer(buf).unwrap();
    assert_eq!(idx.get(true), Some(1));
}

#[test]
fn duplicate_float_construction_is_rejected() {
    let data = [1.2f64, 8.8, 1.2];
    let buf: RawBuffer = (&data[..]).into();
    let err = Index::from_buffer(buf).unwrap_err();
    assert!(matches!(err, Error::NonUnique { ordinal: 0 }));
}

struct WriteableInts<'a>(&'a [i32]);
unsafe impl<'a> RawBufferProvider for WriteableInts<'a> {
    fn kind(&self) -> ordinal_index::Kind {
        ordinal_index::Kind::Int32
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
        true
    }
    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.0.as_ptr() as *const u8, self.0.len() * 4) }
    }
}

#[test]
fn writeable_buffer_construction_is_rejected() {
    let data = [1i32, 2, 3];
    let provider = WriteableInts(&data);
    let err = Index::from_provider(&provider).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch(_)));
}

struct TwoDimensionalInts;
unsafe impl RawBufferProvider for TwoDimensionalInts {
    fn kind(&self) -> ordinal_index::Kind {
        ordinal_index::Kind::Int32
    }
    fn element_width(&self) -> usize {
        4
    }
    fn element_count(&self) -> usize {
        4
    }
    fn ndim(&self) -> usize {
        2
    }
    fn is_writeable(&self) -> bool {
        false
    }
    fn bytes(&self) -> &[u8] {
        &[]
    }
}

#[test]
fn two_dimensional_buffer_construction_is_rejected() {
    let err = Index::from_provider(&TwoDimensionalInts).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch(_)));
}

#[test]
fn mutable_add_then_union_with_frozen() {
    let mut mutable = IndexMut::new();
    for letter in ["a", "b", "c", "d"] {
        mutable.add(letter.to_string()).unwrap();
    }
    let keys: Vec<String> = mutable
        .keys()
        .map(|kv| match kv {
            KeyValue::Object(b) => b.as_any().downcast_ref::<String>().unwrap().clone(),
            other => panic!("expected opaque key, got {other:?}"),
        })
        .collect();
    assert_eq!(keys, vec!["a", "b", "c", "d"]);

    let frozen = Index::from_opaque_iter(["c".to_string(), "d".to_string(), "e".to_string()]).unwrap();
    let merged = &mutable | &frozen;
    let merged_keys: Vec<String> = merged
        .keys()
        .map(|kv| match kv {
            KeyValue::Object(b) => b.as_any().downcast_ref::<String>().unwrap().clone(),
            other => panic!("expected opaque key, got {other:?}"),
        })
        .collect();
    assert_eq!(merged_keys, vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn get_all_returns_positions_in_probe_order_and_repeats_duplicates() {
    let data = [1i32, 100, 300, 4000];
    let buf: RawBuffer = (&data[..]).into();
    let idx = Index::from_buffer(buf).unwrap();
    let positions = idx.get_all([300i32, 100]).unwrap();
    assert_eq!(positions.as_slice(), &[2, 1]);
    let repeated = idx.get_all([4000i32, 4000, 4000]).unwrap();
    assert_eq!(repeated.as_slice(), &[3, 3, 3]);
}

#[test]
fn get_all_fails_without_partial_output_on_any_miss() {
    let data = [1i32, 100, 300, 4000];
    let buf: RawBuffer = (&data[..]).into();
    let idx = Index::from_buffer(buf).unwrap();
    assert!(matches!(idx.get_all([1i32, 999]), Err(Error::KeyMissing)));
}

#[test]
fn get_any_dedups_and_preserves_first_occurrence_order() {
    let idx = Index::from_opaque_iter(["a", "bb", "ccc"]).unwrap();
    let found = idx.get_any([&Opaque("bbb"), &Opaque("ccc"), &Opaque("a"), &Opaque("bbb")]);
    assert_eq!(found, vec![2, 0]);
}

struct FixedWidthStrings {
    bytes: Vec<u8>,
    width: usize,
    count: usize,
}

impl FixedWidthStrings {
    fn new(words: &[&str], width: usize) -> Self {
        let mut bytes = Vec::with_capacity(words.len() * width * 4);
        for word in words {
            let mut n = 0;
            for c in word.chars() {
                bytes.extend_from_slice(&(c as u32).to_ne_bytes());
                n += 1;
            }
            for _ in n..width {
                bytes.extend_from_slice(&0u32.to_ne_bytes());
            }
        }
        FixedWidthStrings { bytes, width, count: words.len() }
    }
}

unsafe impl RawBufferProvider for FixedWidthStrings {
    fn kind(&self) -> ordinal_index::Kind {
        ordinal_index::Kind::Unicode(self.width)
    }
    fn element_width(&self) -> usize {
        self.width * 4
    }
    fn element_count(&self) -> usize {
        self.count
    }
    fn ndim(&self) -> usize {
        1
    }
    fn is_writeable(&self) -> bool {
        false
    }
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[test]
fn string_index_persists_and_restores_ordered_values() {
    let provider = FixedWidthStrings::new(&["alpha", "bravo", "charl"], 5);
    let idx = Index::from_provider(&provider).unwrap();

    let encoded = ordinal_index::persist::to_bytes(&idx).unwrap();
    let restored = ordinal_index::persist::from_bytes(&encoded).unwrap();

    assert_eq!(restored.len(), idx.len());
    let restored_values: Vec<i64> = restored.values().collect();
    assert_eq!(restored_values, vec![0, 1, 2]);
    assert_eq!(restored.get("bravo"), Some(1));
}
