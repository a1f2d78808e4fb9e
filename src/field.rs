//! Field descriptors and the capability contract field types implement.
//!
//! The engine consumes this contract and never implements it: concrete field
//! types (fixed-width integers, bit-fields, byte runs, ...) live in
//! [`crate::fields`] or in downstream crates.

use crate::bitstream::BitStream;
use crate::context::ParsingContext;
use crate::error::{Result, StructError};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// How a field's start offset is computed during decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetPolicy {
    /// Immediately after the previous field (subject to structure alignment)
    Contiguous,
    /// Fixed offset from the structure's start
    Absolute(u64),
    /// Signed displacement from the current cursor
    Relative(i64),
}

impl OffsetPolicy {
    /// A preparsable field's start can be computed before any earlier field
    /// is decoded, i.e. it carries an absolute offset.
    pub fn is_preparsable(&self) -> bool {
        matches!(self, OffsetPolicy::Absolute(_))
    }
}

/// One named, ordered member of a structure's schema.
///
/// Owned by the [`crate::registry::FieldRegistry`] of its structure type and
/// never mutated after registration.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) offset: OffsetPolicy,
    pub(crate) lazy: bool,
    pub(crate) codec: Arc<dyn FieldCodec>,
}

impl FieldDescriptor {
    /// Creates a contiguous, eagerly decoded descriptor.
    pub fn new(name: &str, codec: impl FieldCodec + 'static) -> Self {
        Self {
            name: name.to_string(),
            index: 0,
            offset: OffsetPolicy::Contiguous,
            lazy: false,
            codec: Arc::new(codec),
        }
    }

    /// Pins the field at a fixed offset from the structure's start.
    pub fn at_absolute(mut self, offset: u64) -> Self {
        self.offset = OffsetPolicy::Absolute(offset);
        self
    }

    /// Displaces the field's start from the current cursor.
    pub fn at_relative(mut self, displacement: i64) -> Self {
        self.offset = OffsetPolicy::Relative(displacement);
        self
    }

    /// Marks the field as eligible for deferred (lazy) resolution.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaration index within the registry.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset policy.
    pub fn offset_policy(&self) -> OffsetPolicy {
        self.offset
    }

    /// Whether the field opted in to deferred resolution.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// The field's codec.
    pub fn codec(&self) -> &Arc<dyn FieldCodec> {
        &self.codec
    }
}

/// Lightweight, read-only view of a registered field, handed to codecs
/// during one-time registry initialization so they can resolve references
/// to sibling fields (including forward references).
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub index: usize,
    pub offset: OffsetPolicy,
    pub lazy: bool,
    pub fixed_bits: Option<u64>,
}

/// The capability contract every concrete field type must satisfy.
///
/// The engine drives decode and encode exclusively through this trait; the
/// default method bodies cover the common byte-aligned, fixed-size case.
pub trait FieldCodec: fmt::Debug {
    /// Value used when a caller supplies none before encoding.
    fn default_value(&self, ctx: &ParsingContext<'_>) -> Value;

    /// Fixed size of the encoded field in bits, or `None` when the size
    /// cannot be determined without a value (variable-length fields).
    fn fixed_bits(&self) -> Option<u64>;

    /// Applies the field's offset policy, seeking the stream to the field's
    /// start. Returns the absolute byte offset. `at` is the current cursor.
    fn seek_start(
        &self,
        stream: &mut BitStream<'_>,
        ctx: &ParsingContext<'_>,
        policy: OffsetPolicy,
        at: u64,
    ) -> Result<u64> {
        let target = match policy {
            OffsetPolicy::Contiguous => {
                let rel = at.checked_sub(ctx.start_offset()).ok_or_else(|| {
                    StructError::Value(format!(
                        "cursor at {} is before the structure start {}",
                        at,
                        ctx.start_offset()
                    ))
                })?;
                let align = ctx.alignment();
                let rel = if align > 1 { rel.div_ceil(align) * align } else { rel };
                ctx.start_offset() + rel
            }
            OffsetPolicy::Absolute(offset) => ctx.start_offset() + offset,
            OffsetPolicy::Relative(displacement) => {
                let target = at as i64 + displacement;
                if target < 0 {
                    return Err(StructError::Value(format!(
                        "relative offset {} seeks before the stream start",
                        displacement
                    )));
                }
                target as u64
            }
        };

        // A plain contiguous step must not disturb the sub-byte cursor.
        if target != at {
            stream.seek(target)?;
        }
        Ok(target)
    }

    /// Computes the field's end offset without materializing a value, used
    /// for lazy-length discovery. `None` means the end cannot be known
    /// without decoding, which makes the field ineligible for deferral.
    fn seek_end(&self, _stream: &mut BitStream<'_>, start: u64) -> Result<Option<u64>> {
        match self.fixed_bits() {
            Some(bits) if bits % 8 == 0 => Ok(Some(start + bits / 8)),
            _ => Ok(None),
        }
    }

    /// Decodes a value from the stream. Returns the value and the number of
    /// whole bytes consumed.
    fn decode(&self, stream: &mut BitStream<'_>, ctx: &mut ParsingContext<'_>)
        -> Result<(Value, u64)>;

    /// Resolves a deferred field from its snapshotted byte range.
    ///
    /// Only called for fields that deferred during decode, which requires
    /// [`FieldCodec::seek_end`] to have produced an end offset.
    fn decode_lazy(&self, _raw: &[u8]) -> Result<Value> {
        Err(StructError::Value(
            "field type cannot be resolved lazily".to_string(),
        ))
    }

    /// Encodes a value to the stream. Returns the number of whole bytes
    /// written (partial trailing bits are accounted for by `finalize`).
    fn encode(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        ctx: &mut ParsingContext<'_>,
    ) -> Result<u64>;

    /// Post-decode hook: derives the field's initial value from the raw
    /// decoded value once the whole context is populated.
    fn initial_value(&self, raw: Value, _ctx: &ParsingContext<'_>) -> Result<Value> {
        Ok(raw)
    }

    /// Pre-encode hook: derives the wire value from the caller's value.
    fn final_value(&self, value: Value, _ctx: &ParsingContext<'_>) -> Result<Value> {
        Ok(value)
    }

    /// One-time initialization, invoked exactly once after every field of
    /// the structure has been registered.
    fn initialize(&mut self, _fields: &[FieldInfo]) -> Result<()> {
        Ok(())
    }

    /// Documentation-only C declarator for [`crate::structure::StructDef::as_cstruct`].
    fn c_decl(&self, name: &str) -> String;
}
