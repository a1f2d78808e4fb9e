//! Per-operation parsing state.
//!
//! A [`ParsingContext`] is created fresh for every decode or encode call and
//! owns one runtime slot per field. It is never shared across concurrent
//! calls; once the operation completes the context is frozen (`done`) and
//! becomes read-only.

use crate::bitstream::BitStream;
use crate::error::{Result, StructError};
use crate::registry::FieldRegistry;
use crate::value::Value;
use std::sync::Arc;

/// Resolution state of one field within an operation. Transitions only move
/// forward: `Unresolved → LazyPending → Resolved` or `Unresolved → Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionState {
    Unresolved,
    LazyPending,
    Resolved,
}

/// Runtime state of one field during a single decode or encode.
#[derive(Debug, Clone)]
pub struct FieldSlot {
    state: ResolutionState,
    value: Option<Value>,
    offset: Option<u64>,
    length: Option<u64>,
    lazy: bool,
    preparsed: bool,
    /// Byte snapshot of a deferred field's span, decoded on demand later
    raw: Option<Vec<u8>>,
}

impl FieldSlot {
    fn new(lazy: bool) -> Self {
        Self {
            state: ResolutionState::Unresolved,
            value: None,
            offset: None,
            length: None,
            lazy,
            preparsed: false,
            raw: None,
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Observed absolute byte offset, once positioned.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Observed encoded length in bytes; `None` while lazy and unknown.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub(crate) fn is_preparsed(&self) -> bool {
        self.preparsed
    }

    fn advance(&mut self, next: ResolutionState) {
        debug_assert!(self.state <= next, "resolution state moved backward");
        self.state = next;
    }
}

/// Mutable per-operation state: one slot per field, the structure's start
/// offset, and the running maximum offset observed across all fields.
#[derive(Debug)]
pub struct ParsingContext<'d> {
    registry: &'d FieldRegistry,
    structure: &'d str,
    alignment: u64,
    start_offset: u64,
    max_offset: u64,
    done: bool,
    slots: Vec<FieldSlot>,
}

impl<'d> ParsingContext<'d> {
    pub(crate) fn new(
        registry: &'d FieldRegistry,
        structure: &'d str,
        alignment: u64,
        start_offset: u64,
    ) -> Self {
        let slots = registry.iter().map(|f| FieldSlot::new(f.is_lazy())).collect();
        Self {
            registry,
            structure,
            alignment,
            start_offset,
            max_offset: start_offset,
            done: false,
            slots,
        }
    }

    /// Name of the structure type this operation belongs to.
    pub fn structure(&self) -> &str {
        self.structure
    }

    /// The shared field registry of the structure type.
    pub fn registry(&self) -> &FieldRegistry {
        self.registry
    }

    /// Alignment setting, in bytes, applied to contiguous fields.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Absolute byte offset where the structure begins.
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Running maximum offset observed so far in this operation.
    pub fn max_offset(&self) -> u64 {
        self.max_offset
    }

    /// True once the operation has completed and the context is frozen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Ordered lookup of a field's runtime slot.
    pub fn field(&self, name: &str) -> Option<&FieldSlot> {
        self.registry.index_of(name).map(|i| &self.slots[i])
    }

    /// Resolved value of a named field, if materialized.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(FieldSlot::value)
    }

    /// Overwrites a field's value from a structure-level hook.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        if self.done {
            return Err(StructError::Value(
                "context is frozen once the operation completes".to_string(),
            ));
        }
        let index = self
            .registry
            .index_of(name)
            .ok_or_else(|| StructError::FieldNotFound(name.to_string()))?;
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        slot.advance(ResolutionState::Resolved);
        Ok(())
    }

    /// Resolved value of a named field, materializing a deferred one from
    /// its byte snapshot. Check predicates and hooks read fields through
    /// this, so a field stays readable whether or not it deferred. The
    /// slot itself is left deferred.
    pub fn materialize(&self, name: &str) -> Result<Value> {
        let index = self
            .registry
            .index_of(name)
            .ok_or_else(|| StructError::FieldNotFound(name.to_string()))?;
        let slot = &self.slots[index];
        if let Some(value) = slot.value() {
            return Ok(value.clone());
        }
        let raw = slot
            .raw
            .as_ref()
            .ok_or_else(|| StructError::Value(format!("field '{}' has no value", name)))?;
        let codec = match self.registry.get(index) {
            Some(descriptor) => Arc::clone(descriptor.codec()),
            None => return Err(StructError::FieldNotFound(name.to_string())),
        };
        let qualified = format!("{}.{}", self.structure, name);
        let raw_value = codec.decode_lazy(raw).map_err(|e| e.at_field(&qualified))?;
        codec
            .initial_value(raw_value, self)
            .map_err(|e| e.at_field(&qualified))
    }

    /// Materializes a field's value on demand, decoding it at its recorded
    /// offset if needed. This is how an earlier-declared field references a
    /// later-declared, pre-positioned one. The cursor is restored afterwards.
    pub fn demand(&mut self, stream: &mut BitStream<'_>, name: &str) -> Result<Value> {
        let index = self
            .registry
            .index_of(name)
            .ok_or_else(|| StructError::FieldNotFound(name.to_string()))?;

        if self.slots[index].state == ResolutionState::Resolved {
            // Already materialized; value is present by construction.
            if let Some(value) = self.slots[index].value.clone() {
                return Ok(value);
            }
        }

        let offset = self.slots[index].offset.ok_or_else(|| {
            StructError::Value(format!("field '{}' has no known offset yet", name))
        })?;
        let codec = match self.registry.get(index) {
            Some(descriptor) => Arc::clone(descriptor.codec()),
            None => return Err(StructError::FieldNotFound(name.to_string())),
        };
        let qualified = format!("{}.{}", self.structure, name);

        let saved = stream.position()?;
        stream.seek(offset)?;
        let (value, consumed) = codec
            .decode(stream, self)
            .map_err(|e| e.at_field(&qualified))?;
        stream.seek(saved)?;

        self.resolve(index, value.clone(), consumed);
        self.observe_offset(offset + consumed);
        Ok(value)
    }

    pub(crate) fn slot(&self, index: usize) -> &FieldSlot {
        &self.slots[index]
    }

    pub(crate) fn observe_offset(&mut self, offset: u64) {
        self.max_offset = self.max_offset.max(offset);
    }

    pub(crate) fn mark_preparsed(&mut self, index: usize, offset: u64) {
        let slot = &mut self.slots[index];
        slot.preparsed = true;
        slot.offset = Some(offset);
    }

    pub(crate) fn set_offset(&mut self, index: usize, offset: u64) {
        self.slots[index].offset = Some(offset);
    }

    pub(crate) fn resolve(&mut self, index: usize, value: Value, length: u64) {
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        slot.length = Some(length);
        slot.advance(ResolutionState::Resolved);
    }

    pub(crate) fn defer(&mut self, index: usize, length: u64, raw: Vec<u8>) {
        let slot = &mut self.slots[index];
        slot.length = Some(length);
        slot.raw = Some(raw);
        slot.advance(ResolutionState::LazyPending);
    }

    pub(crate) fn take_value(&mut self, index: usize) -> Option<Value> {
        self.slots[index].value.take()
    }

    pub(crate) fn put_value(&mut self, index: usize, value: Value) {
        self.slots[index].value = Some(value);
    }

    pub(crate) fn take_raw(&mut self, index: usize) -> Option<Vec<u8>> {
        self.slots[index].raw.take()
    }

    /// Freezes the context. All mutation beyond this point is rejected.
    pub(crate) fn finish(&mut self) {
        self.done = true;
    }
}
