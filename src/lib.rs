//! An insertion-order-preserving, unique-key hash index.
//!
//! This crate assigns every inserted key a stable, gap-free `i64` ordinal equal to its insertion
//! position, and looks keys back up by hash in O(1) amortized time — the structure CPython's
//! `dict` and Rust's own `indexmap` popularized, specialized here to two different ways of owning
//! the keys:
//!
//! - **Opaque mode** ([`Index::from_opaque_iter`], [`IndexMut`]): keys are arbitrary
//!   `Hash + Eq + Clone + Debug + Send + Sync + 'static` Rust values, owned by the index.
//! - **Buffer mode** ([`Index::from_buffer`], [`Index::from_provider`]): keys are borrowed
//!   straight out of an external fixed-width typed buffer (see [`buffer`]) with no copy, and
//!   compare/hash under a canonical cross-width, cross-category numeric and string rule so that
//!   e.g. an `i8` buffer element, a `bool` probe, and a `20.0f64` probe can all refer to the same
//!   key.
//!
//! Lookups accept any type implementing [`probe::IntoProbeKey`] (the primitive numeric types,
//! `&str`, `&[u8]`, or [`Opaque`] for opaque-mode probing — see that type's docs for why the two
//! are split). [`Error`] covers every failure mode; [`persist`] covers saving and loading.
#![allow(dead_code)]

mod buffer;
mod erased;
mod error;
mod hash;
mod index;
mod integer;
mod key;
mod kind;
pub mod persist;
mod probe;
mod table;

pub use buffer::{DateTimeSlice, RawBuffer, RawBufferProvider};
pub use erased::{ErasedKey, Opaque};
pub use error::{Error, Result};
pub use index::{Index, IndexMut, Items, Keys, PositionBuffer};
pub use key::KeyValue;
pub use kind::Kind;
pub use probe::{IntoProbeKey, ProbeKey};
