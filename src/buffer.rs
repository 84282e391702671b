//! The typed-buffer supplier contract (component F): a safe stand-in for the "opaque provider of
//! `(kind, element_width, element_count, base_pointer, writeable_flag)`" that a real typed-array
//! library would hand this crate.
//!
//! [`RawBufferProvider`] is the contract itself; an embedder with a genuinely foreign buffer (a
//! memory-mapped column, a buffer shared across an FFI boundary) implements it directly.
//! [`RawBuffer`] is this crate's own adapter, which validates the contract once at construction
//! and is what ordinary Rust callers get via the `From<&[T]>` impls below.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{Error, Result};
use crate::kind::Kind;

/// The contract a typed buffer supplier must satisfy. See the module documentation.
///
/// # Safety
///
/// `bytes()` must return a contiguous, row-major view of exactly `element_count() *
/// element_width()` bytes that remains valid and (if `is_writeable()` is false) unmodified for as
/// long as the implementor is borrowed.
pub unsafe trait RawBufferProvider {
    fn kind(&self) -> Kind;
    fn element_width(&self) -> usize;
    fn element_count(&self) -> usize;
    fn ndim(&self) -> usize;
    fn is_writeable(&self) -> bool;
    fn bytes(&self) -> &[u8];
}

/// A validated, borrowed view of a one-dimensional, non-writeable typed buffer.
///
/// This is the Key Store used by buffer-mode indices (§3). It never copies or allocates; it
/// simply remembers the kind and re-borrows the provider's bytes.
#[derive(Clone, Copy)]
pub struct RawBuffer<'a> {
    kind: Kind,
    data: &'a [u8],
    count: usize,
}

impl<'a> RawBuffer<'a> {
    /// Validate and adapt an external buffer provider.
    ///
    /// Fails with [`Error::TypeMismatch`] if the buffer is not one-dimensional, is writeable, its
    /// kind is unsupported, or its advertised width/length is inconsistent with its byte count —
    /// this is the hard requirement preserved from Open Question (a) in the design notes.
    pub fn from_provider<P: RawBufferProvider>(provider: &'a P) -> Result<Self> {
        if provider.ndim() != 1 {
            return Err(Error::TypeMismatch(format!(
                "buffer must be one-dimensional, got rank {}",
                provider.ndim()
            )));
        }
        if provider.is_writeable() {
            return Err(Error::TypeMismatch(
                "buffer must not be writeable".to_string(),
            ));
        }
        let kind = provider.kind();
        let width = kind
            .element_width()
            .ok_or_else(|| Error::TypeMismatch(format!("unsupported buffer kind {}", kind)))?;
        if width != provider.element_width() {
            return Err(Error::TypeMismatch(format!(
                "buffer element width {} does not match kind {} (expected {})",
                provider.element_width(),
                kind,
                width
            )));
        }
        let data = provider.bytes();
        let expected_len = width
            .checked_mul(provider.element_count())
            .ok_or_else(|| Error::TypeMismatch("buffer length overflow".to_string()))?;
        if data.len() != expected_len {
            return Err(Error::TypeMismatch(format!(
                "buffer byte length {} does not match {} elements of width {}",
                data.len(),
                provider.element_count(),
                width
            )));
        }
        Ok(RawBuffer {
            kind,
            data,
            count: provider.element_count(),
        })
    }

    /// Build directly from an already-known-good kind and byte slice, skipping the
    /// `RawBufferProvider` indirection. Used by the `From<&[T]>` impls below and by persistence.
    pub(crate) fn from_raw_parts(kind: Kind, data: &'a [u8], count: usize) -> Self {
        RawBuffer { kind, data, count }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Byte slice backing element `i`. Panics if `i >= self.len()`.
    #[inline]
    pub(crate) fn element_bytes(&self, i: usize) -> &'a [u8] {
        let w = self.kind.element_width().expect("buffer kind always has a width");
        &self.data[i * w..(i + 1) * w]
    }
}

/// Reinterpret a native slice as its raw byte representation with no copy.
///
/// # Safety
/// `T` must have no padding bytes that participate in equality/hashing beyond its value
/// representation; this holds for every primitive numeric type this module uses it with.
unsafe fn as_bytes<T>(s: &[T]) -> &[u8] {
    std::slice::from_raw_parts(s.as_ptr() as *const u8, std::mem::size_of_val(s))
}

macro_rules! impl_from_numeric_slice {
    ($t: ty, $kind: expr) => {
        impl<'a> From<&'a [$t]> for RawBuffer<'a> {
            fn from(s: &'a [$t]) -> Self {
                // SAFETY: numeric primitives have no padding; see `as_bytes`.
                RawBuffer::from_raw_parts($kind, unsafe { as_bytes(s) }, s.len())
            }
        }
    };
}

impl_from_numeric_slice!(i8, Kind::Int8);
impl_from_numeric_slice!(i16, Kind::Int16);
impl_from_numeric_slice!(i32, Kind::Int32);
impl_from_numeric_slice!(i64, Kind::Int64);
impl_from_numeric_slice!(u8, Kind::UInt8);
impl_from_numeric_slice!(u16, Kind::UInt16);
impl_from_numeric_slice!(u32, Kind::UInt32);
impl_from_numeric_slice!(u64, Kind::UInt64);
impl_from_numeric_slice!(f32, Kind::Float32);
impl_from_numeric_slice!(f64, Kind::Float64);
impl_from_numeric_slice!(half::f16, Kind::Float16);

/// A buffer of absolute timestamps, stored as signed 64-bit integers.
pub struct DateTimeSlice<'a>(pub &'a [i64]);

impl<'a> From<DateTimeSlice<'a>> for RawBuffer<'a> {
    fn from(s: DateTimeSlice<'a>) -> Self {
        // SAFETY: i64 has no padding.
        RawBuffer::from_raw_parts(Kind::DateTime64, unsafe { as_bytes(s.0) }, s.0.len())
    }
}

pub(crate) fn read_i16(bytes: &[u8]) -> i16 {
    NativeEndian::read_i16(bytes)
}
pub(crate) fn read_i32(bytes: &[u8]) -> i32 {
    NativeEndian::read_i32(bytes)
}
pub(crate) fn read_i64(bytes: &[u8]) -> i64 {
    NativeEndian::read_i64(bytes)
}
pub(crate) fn read_u16(bytes: &[u8]) -> u16 {
    NativeEndian::read_u16(bytes)
}
pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    NativeEndian::read_u32(bytes)
}
pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    NativeEndian::read_u64(bytes)
}
pub(crate) fn read_f32(bytes: &[u8]) -> f32 {
    NativeEndian::read_f32(bytes)
}
pub(crate) fn read_f64(bytes: &[u8]) -> f64 {
    NativeEndian::read_f64(bytes)
}
pub(crate) fn read_f16(bytes: &[u8]) -> half::f16 {
    half::f16::from_bits(NativeEndian::read_u16(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mutable<'a>(&'a [u8]);
    unsafe impl<'a> RawBufferProvider for Mutable<'a> {
        fn kind(&self) -> Kind {
            Kind::Int32
        }
        fn element_width(&self) -> usize {
            4
        }
        fn element_count(&self) -> usize {
            self.0.len() / 4
        }
        fn ndim(&self) -> usize {
            1
        }
        fn is_writeable(&self) -> bool {
            true
        }
        fn bytes(&self) -> &[u8] {
            self.0
        }
    }

    #[test]
    fn writeable_buffer_is_rejected() {
        let data = [0u8; 8];
        let provider = Mutable(&data);
        assert!(matches!(
            RawBuffer::from_provider(&provider),
            Err(Error::TypeMismatch(_))
        ));
    }

    struct TwoD;
    unsafe impl RawBufferProvider for TwoD {
        fn kind(&self) -> Kind {
            Kind::Int32
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
    fn multi_dimensional_buffer_is_rejected() {
        assert!(matches!(
            RawBuffer::from_provider(&TwoD),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn native_slice_round_trips_through_element_bytes() {
        let data = [1i32, 5, 10, 20];
        let buf: RawBuffer = (&data[..]).into();
        assert_eq!(buf.len(), 4);
        assert_eq!(read_i32(buf.element_bytes(3)), 20);
    }
}
