//! Library error types.
//!
use std::fmt;

/// An `ordinal-index` `Result`, normally returning an [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error raised by this crate. Encompasses any issues that can happen during construction,
/// lookup, or persistence of an [`Index`](crate::index::Index) or
/// [`IndexMut`](crate::index::IndexMut).
#[derive(Clone, Debug)]
pub enum Error {
    /// Occurs when a key, buffer, or sequence argument doesn't have a shape this crate can work
    /// with: an unsupported buffer kind, a buffer of rank other than 1, a writeable buffer where
    /// an immutable one was required, or an argument to `get_all`/`get_any` with no known length.
    TypeMismatch(String),
    /// Occurs when construction, `add`, or `update` would insert a key that already exists.
    /// Carries the ordinal of the key that already occupies that slot.
    NonUnique {
        /// The ordinal already assigned to this key.
        ordinal: i64,
    },
    /// Occurs when a key is looked up by `index_of` or `get_all` and is not present.
    KeyMissing,
    /// Occurs when a persisted byte string is malformed or was produced by an incompatible
    /// format version.
    BadEncode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
            Error::NonUnique { ordinal } => {
                write!(f, "key is not unique: already assigned ordinal {}", ordinal)
            }
            Error::KeyMissing => write!(f, "key not found in index"),
            Error::BadEncode(msg) => write!(f, "bad encoding: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl std::convert::From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::BadEncode(e.to_string())
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BadEncode(e.to_string())
    }
}
