//! The kind tag that fixes a buffer-mode index's element representation.

use std::fmt;

/// The element representation carried by a buffer-mode [`Index`](crate::index::Index), or
/// `Object` for opaque-mode indices.
///
/// A kind is fixed at construction and never changes. `Unicode` and `Bytes` additionally carry
/// the fixed element width (in code points / bytes respectively), since two buffers of the same
/// base kind but different widths are still comparable under canonical equality (trailing zeros
/// are stripped on both sides).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Opaque, heap-allocated values with user-defined hashing and equality.
    Object,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    /// An 8-byte signed integer count of time units since a fixed epoch.
    DateTime64,
    /// Fixed-width Unicode code-point string, `W` code points per element.
    Unicode(usize),
    /// Fixed-width byte string, `W` bytes per element.
    Bytes(usize),
}

impl Kind {
    /// Byte width of a single stored element of this kind, or `None` for `Object` (which has no
    /// fixed on-disk representation managed by this crate).
    pub fn element_width(&self) -> Option<usize> {
        use Kind::*;
        Some(match self {
            Object => return None,
            Int8 | UInt8 => 1,
            Int16 | UInt16 | Float16 => 2,
            Int32 | UInt32 | Float32 => 4,
            Int64 | UInt64 | Float64 | DateTime64 => 8,
            Unicode(w) => w * 4,
            Bytes(w) => *w,
        })
    }

    /// `true` if this kind is one of the numeric kinds (integer, float, or `DateTime64`).
    pub fn is_numeric(&self) -> bool {
        use Kind::*;
        matches!(
            self,
            Int8 | Int16
                | Int32
                | Int64
                | UInt8
                | UInt16
                | UInt32
                | UInt64
                | Float16
                | Float32
                | Float64
                | DateTime64
        )
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Kind::Object)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Kind::*;
        match self {
            Object => write!(f, "object"),
            Int8 => write!(f, "int8"),
            Int16 => write!(f, "int16"),
            Int32 => write!(f, "int32"),
            Int64 => write!(f, "int64"),
            UInt8 => write!(f, "uint8"),
            UInt16 => write!(f, "uint16"),
            UInt32 => write!(f, "uint32"),
            UInt64 => write!(f, "uint64"),
            Float16 => write!(f, "float16"),
            Float32 => write!(f, "float32"),
            Float64 => write!(f, "float64"),
            DateTime64 => write!(f, "datetime64"),
            Unicode(w) => write!(f, "unicode[{}]", w),
            Bytes(w) => write!(f, "bytes[{}]", w),
        }
    }
}

/// One-byte wire tag for each [`Kind`], used by the persistence format (`persist.rs`).
pub(crate) mod wire {
    pub const OBJECT: u8 = 0;
    pub const INT8: u8 = 1;
    pub const INT16: u8 = 2;
    pub const INT32: u8 = 3;
    pub const INT64: u8 = 4;
    pub const UINT8: u8 = 5;
    pub const UINT16: u8 = 6;
    pub const UINT32: u8 = 7;
    pub const UINT64: u8 = 8;
    pub const FLOAT16: u8 = 9;
    pub const FLOAT32: u8 = 10;
    pub const FLOAT64: u8 = 11;
    pub const DATETIME64: u8 = 12;
    pub const UNICODE: u8 = 13;
    pub const BYTES: u8 = 14;
}

impl Kind {
    pub(crate) fn wire_tag(&self) -> u8 {
        use Kind::*;
        match self {
            Object => wire::OBJECT,
            Int8 => wire::INT8,
            Int16 => wire::INT16,
            Int32 => wire::INT32,
            Int64 => wire::INT64,
            UInt8 => wire::UINT8,
            UInt16 => wire::UINT16,
            UInt32 => wire::UINT32,
            UInt64 => wire::UINT64,
            Float16 => wire::FLOAT16,
            Float32 => wire::FLOAT32,
            Float64 => wire::FLOAT64,
            DateTime64 => wire::DATETIME64,
            Unicode(_) => wire::UNICODE,
            Bytes(_) => wire::BYTES,
        }
    }
}
