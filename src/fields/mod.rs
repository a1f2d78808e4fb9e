//! Built-in field types implementing the [`crate::field::FieldCodec`] contract.
//!
//! The engine itself is codec-agnostic; these cover the common cases of
//! fixed-width integers, packed bit-fields, and raw byte runs.

pub mod bits;
pub mod bytes;
pub mod scalar;

pub use bits::BitsField;
pub use bytes::{BytesField, RemainingBytesField};
pub use scalar::{Endianness, IntField, UIntField};
