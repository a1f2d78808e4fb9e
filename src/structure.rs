//! Structure definitions and the two-phase decode/encode engine.
//!
//! A [`StructBuilder`] collects field descriptors, check predicates, and
//! structure-level hooks into a frozen [`StructDef`]. Decoding a `StructDef`
//! from a stream yields a [`StructInstance`]; encoding an instance is the
//! exact mirror. Both paths run through a private [`ParsingContext`] and fail
//! fast: one field's failure aborts the whole structure, because downstream
//! offsets may already depend on the failed field's outcome.

use crate::bitstream::{BitStream, ByteStream};
use crate::context::{ParsingContext, ResolutionState};
use crate::error::{Result, StructError};
use crate::field::{FieldCodec, FieldDescriptor, OffsetPolicy};
use crate::registry::FieldRegistry;
use crate::value::Value;
use std::cell::OnceCell;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Named boolean predicate evaluated over the fully-populated context,
/// after decode and before encode.
struct Check {
    name: String,
    pred: Box<dyn Fn(&ParsingContext<'_>) -> bool>,
}

type Hook = Box<dyn Fn(&mut ParsingContext<'_>) -> Result<()>>;

/// Explicit, call-at-definition-time schema builder for a structure type.
pub struct StructBuilder {
    name: String,
    registry: FieldRegistry,
    checks: Vec<Check>,
    init_hook: Option<Hook>,
    finalize_hook: Option<Hook>,
    alignment: u64,
}

impl StructBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            registry: FieldRegistry::new(),
            checks: Vec::new(),
            init_hook: None,
            finalize_hook: None,
            alignment: 1,
        }
    }

    /// Appends a contiguous field.
    pub fn field(self, name: &str, codec: impl FieldCodec + 'static) -> Self {
        self.descriptor(FieldDescriptor::new(name, codec))
    }

    /// Appends a fully-specified descriptor (offset policy, lazy flag).
    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        self.registry.add_field(descriptor);
        self
    }

    /// Registers a named check predicate.
    pub fn check(
        mut self,
        name: &str,
        pred: impl Fn(&ParsingContext<'_>) -> bool + 'static,
    ) -> Self {
        self.checks.push(Check {
            name: name.to_string(),
            pred: Box::new(pred),
        });
        self
    }

    /// Byte alignment applied to contiguous fields (default 1).
    pub fn alignment(mut self, bytes: u64) -> Self {
        self.alignment = bytes.max(1);
        self
    }

    /// Structure-level hook run after decode, before checks.
    pub fn on_initialize(
        mut self,
        hook: impl Fn(&mut ParsingContext<'_>) -> Result<()> + 'static,
    ) -> Self {
        self.init_hook = Some(Box::new(hook));
        self
    }

    /// Structure-level hook run before encode checks.
    pub fn on_finalize(
        mut self,
        hook: impl Fn(&mut ParsingContext<'_>) -> Result<()> + 'static,
    ) -> Self {
        self.finalize_hook = Some(Box::new(hook));
        self
    }

    /// Freezes the schema, running each codec's one-time initialization.
    pub fn build(mut self) -> Result<Arc<StructDef>> {
        self.registry.initialize_fields()?;
        Ok(Arc::new(StructDef {
            name: self.name,
            registry: self.registry,
            checks: self.checks,
            init_hook: self.init_hook,
            finalize_hook: self.finalize_hook,
            alignment: self.alignment,
        }))
    }
}

/// A frozen structure type: its field registry, checks, and hooks.
pub struct StructDef {
    name: String,
    registry: FieldRegistry,
    checks: Vec<Check>,
    init_hook: Option<Hook>,
    finalize_hook: Option<Hook>,
    alignment: u64,
}

impl fmt::Debug for StructDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructDef")
            .field("name", &self.name)
            .field("fields", &self.registry.len())
            .field("checks", &self.checks.len())
            .field("alignment", &self.alignment)
            .finish()
    }
}

impl StructDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Creates an empty instance; unset fields encode as their defaults.
    pub fn instance(self: &Arc<Self>) -> StructInstance {
        StructInstance {
            def: Arc::clone(self),
            fields: (0..self.registry.len()).map(|_| None).collect(),
        }
    }

    /// Statically computed total size in bytes. Fails with
    /// [`StructError::ImpossibleToCalculateLength`] if any field cannot
    /// report a fixed size.
    pub fn static_length(&self) -> Result<u64> {
        self.registry
            .static_length()
            .ok_or_else(|| StructError::ImpossibleToCalculateLength(self.name.clone()))
    }

    /// Decodes one instance from the stream, starting at its current
    /// position. Returns the instance and the number of bytes the structure
    /// spans (`max_offset - start_offset`).
    pub fn from_stream<S: ByteStream>(
        self: &Arc<Self>,
        stream: &mut S,
    ) -> Result<(StructInstance, u64)> {
        let mut stream = BitStream::new(stream);
        self.decode_stream(&mut stream)
    }

    /// Decodes one instance from an in-memory buffer.
    pub fn from_bytes(self: &Arc<Self>, data: &[u8]) -> Result<StructInstance> {
        let mut cursor = Cursor::new(data.to_vec());
        let (instance, _) = self.from_stream(&mut cursor)?;
        Ok(instance)
    }

    /// Renders the schema as a C-struct-like textual declaration. The output
    /// is documentation for humans, not a parseable or binary-compatible
    /// contract.
    pub fn as_cstruct(&self) -> String {
        let mut out = format!("typedef struct {} {{\n", self.name);
        for field in self.registry.iter() {
            out.push_str("    ");
            out.push_str(&field.codec().c_decl(field.name()));
            out.push_str(";\n");
        }
        out.push_str(&format!("}} {};\n", self.name));
        out
    }

    fn qualify(&self, field: &str) -> String {
        format!("{}.{}", self.name, field)
    }

    fn run_checks(&self, ctx: &ParsingContext<'_>) -> Result<()> {
        for check in &self.checks {
            if !(check.pred)(ctx) {
                return Err(StructError::Check {
                    structure: self.name.clone(),
                    check: check.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn decode_stream(
        self: &Arc<Self>,
        stream: &mut BitStream<'_>,
    ) -> Result<(StructInstance, u64)> {
        let start = stream.position()?;
        let mut ctx = ParsingContext::new(&self.registry, &self.name, self.alignment, start);

        // Phase A: pre-position preparsable fields without consuming bytes,
        // so earlier-declared fields can reference later-declared ones.
        for field in self.registry.iter() {
            if let OffsetPolicy::Absolute(offset) = field.offset_policy() {
                let absolute = start + offset;
                stream
                    .seek(absolute)
                    .map_err(|e| e.at_field(&self.qualify(field.name())))?;
                ctx.mark_preparsed(field.index(), absolute);
            }
        }

        // Phase B: sequential resolution in declaration order.
        stream.seek(start)?;
        for field in self.registry.iter() {
            let qualified = self.qualify(field.name());
            let at = stream.position()?;
            let offset = field
                .codec()
                .seek_start(stream, &ctx, field.offset_policy(), at)
                .map_err(|e| e.at_field(&qualified))?;
            ctx.set_offset(field.index(), offset);

            // Already materialized through a demand() from an earlier field:
            // skip re-decoding and step over its known span.
            let (materialized, known_len) = {
                let slot = ctx.slot(field.index());
                (
                    slot.is_preparsed() && slot.value().is_some(),
                    slot.length().unwrap_or(0),
                )
            };
            if materialized {
                stream.seek(offset + known_len)?;
                ctx.observe_offset(offset + known_len);
                continue;
            }

            // Deferral is allowed only when nothing downstream carries an
            // absolute offset that this field's value could feed.
            let next_is_preparsable = self
                .registry
                .get(field.index() + 1)
                .map(|n| n.offset_policy().is_preparsable())
                .unwrap_or(false);

            if field.is_lazy() && !next_is_preparsable {
                if let Some(end) = field
                    .codec()
                    .seek_end(stream, offset)
                    .map_err(|e| e.at_field(&qualified))?
                {
                    // Snapshot the span without decoding a value.
                    let length = end - offset;
                    let mut raw = vec![0u8; length as usize];
                    stream
                        .read_exact(&mut raw)
                        .map_err(|e| e.at_field(&qualified))?;
                    ctx.defer(field.index(), length, raw);
                    ctx.observe_offset(end);
                    continue;
                }
            }

            let (value, consumed) = field
                .codec()
                .decode(stream, &mut ctx)
                .map_err(|e| e.at_field(&qualified))?;
            ctx.resolve(field.index(), value, consumed);
            ctx.observe_offset(offset + consumed);
            ctx.observe_offset(stream.position()?);
        }

        // Initial values, over the now-fully-populated context.
        for field in self.registry.iter() {
            if ctx.slot(field.index()).state() != ResolutionState::Resolved {
                continue;
            }
            if let Some(raw) = ctx.take_value(field.index()) {
                let value = field
                    .codec()
                    .initial_value(raw, &ctx)
                    .map_err(|e| e.at_field(&self.qualify(field.name())))?;
                ctx.put_value(field.index(), value);
            }
        }

        if let Some(hook) = &self.init_hook {
            hook(&mut ctx)?;
        }
        self.run_checks(&ctx)?;
        ctx.finish();

        // Sibling snapshot handed to deferred values, taken before the
        // slots are drained below.
        let siblings: Arc<Vec<Option<Value>>> = Arc::new(
            self.registry
                .iter()
                .map(|f| ctx.slot(f.index()).value().cloned())
                .collect(),
        );

        let mut fields = Vec::with_capacity(self.registry.len());
        for field in self.registry.iter() {
            let index = field.index();
            let data = match ctx.slot(index).state() {
                ResolutionState::Resolved => {
                    let value = ctx.take_value(index).ok_or_else(|| {
                        StructError::Value(format!(
                            "field '{}' resolved without a value",
                            field.name()
                        ))
                    })?;
                    FieldData::Eager(value)
                }
                ResolutionState::LazyPending => {
                    let raw = ctx.take_raw(index).ok_or_else(|| {
                        StructError::Value(format!(
                            "field '{}' deferred without a snapshot",
                            field.name()
                        ))
                    })?;
                    FieldData::Deferred(LazyValue::new(
                        Arc::clone(field.codec()),
                        raw,
                        Arc::clone(self),
                        Arc::clone(&siblings),
                        start,
                    ))
                }
                ResolutionState::Unresolved => {
                    return Err(StructError::Value(format!(
                        "field '{}' was never resolved",
                        field.name()
                    )));
                }
            };
            fields.push(Some(data));
        }

        let consumed = ctx.max_offset() - start;
        let instance = StructInstance {
            def: Arc::clone(self),
            fields,
        };
        Ok((instance, consumed))
    }
}

/// A deferred field value: the codec plus the snapshotted byte span it will
/// decode on first access. Resolution is memoized.
///
/// Resolution decodes the snapshot and then applies the codec's
/// initial-value derivation, exactly as the eager path does, over a
/// read-only replay of the sibling values captured when the instance was
/// built. Siblings that themselves deferred appear unset in that replay.
pub struct LazyValue {
    codec: Arc<dyn FieldCodec>,
    raw: Vec<u8>,
    def: Arc<StructDef>,
    siblings: Arc<Vec<Option<Value>>>,
    start: u64,
    cell: OnceCell<Value>,
}

impl LazyValue {
    fn new(
        codec: Arc<dyn FieldCodec>,
        raw: Vec<u8>,
        def: Arc<StructDef>,
        siblings: Arc<Vec<Option<Value>>>,
        start: u64,
    ) -> Self {
        Self {
            codec,
            raw,
            def,
            siblings,
            start,
            cell: OnceCell::new(),
        }
    }

    /// Materializes the value, decoding the snapshot on first access.
    pub fn resolve(&self) -> Result<&Value> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let raw = self.codec.decode_lazy(&self.raw)?;
        let mut ctx = ParsingContext::new(
            &self.def.registry,
            &self.def.name,
            self.def.alignment,
            self.start,
        );
        for (index, value) in self.siblings.iter().enumerate() {
            if let Some(value) = value {
                ctx.put_value(index, value.clone());
            }
        }
        ctx.finish();
        let value = self.codec.initial_value(raw, &ctx)?;
        Ok(self.cell.get_or_init(|| value))
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => write!(f, "LazyValue(resolved: {})", value),
            None => write!(f, "LazyValue(pending, {} bytes)", self.raw.len()),
        }
    }
}

/// Value of one field within an instance: either materialized or deferred.
/// Deferred values are resolved through an explicit accessor, never
/// implicitly.
#[derive(Debug)]
pub enum FieldData {
    Eager(Value),
    Deferred(LazyValue),
}

impl FieldData {
    /// Materializes the value, resolving a deferred one if needed.
    pub fn resolve(&self) -> Result<&Value> {
        match self {
            FieldData::Eager(value) => Ok(value),
            FieldData::Deferred(lazy) => lazy.resolve(),
        }
    }
}

/// A materialized structure value: one (possibly deferred) value per field.
///
/// Created at the end of a successful decode, or directly by a caller that
/// supplies field values before encoding.
#[derive(Debug)]
pub struct StructInstance {
    def: Arc<StructDef>,
    fields: Vec<Option<FieldData>>,
}

impl StructInstance {
    /// The structure type this instance belongs to.
    pub fn def(&self) -> &Arc<StructDef> {
        &self.def
    }

    /// Sets a field's value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .def
            .registry
            .index_of(name)
            .ok_or_else(|| StructError::FieldNotFound(name.to_string()))?;
        self.fields[index] = Some(FieldData::Eager(value.into()));
        Ok(())
    }

    /// Returns a field's value, materializing a deferred one on demand.
    pub fn get(&self, name: &str) -> Result<&Value> {
        let index = self
            .def
            .registry
            .index_of(name)
            .ok_or_else(|| StructError::FieldNotFound(name.to_string()))?;
        match &self.fields[index] {
            Some(data) => data.resolve(),
            None => Err(StructError::Value(format!(
                "field '{}' has no value",
                name
            ))),
        }
    }

    /// True while the named field's value is still deferred and has never
    /// been materialized.
    pub fn is_deferred(&self, name: &str) -> bool {
        self.def
            .registry
            .index_of(name)
            .and_then(|i| self.fields[i].as_ref())
            .map(|data| match data {
                FieldData::Deferred(lazy) => lazy.cell.get().is_none(),
                FieldData::Eager(_) => false,
            })
            .unwrap_or(false)
    }

    /// Encodes the instance to the stream at its current position. Returns
    /// the number of bytes the structure spans, including any partial byte
    /// flushed by the stream's finalize step.
    pub fn to_stream<S: ByteStream>(&self, stream: &mut S) -> Result<u64> {
        let mut stream = BitStream::new(stream);
        self.encode_stream(&mut stream)
    }

    /// Encodes the instance into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.to_stream(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn encode_stream(&self, stream: &mut BitStream<'_>) -> Result<u64> {
        let def = &self.def;
        let start = stream.position()?;
        let mut ctx = ParsingContext::new(&def.registry, &def.name, def.alignment, start);

        // Final values: unwrap deferred proxies and apply pre-encode hooks.
        for field in def.registry.iter() {
            let qualified = def.qualify(field.name());
            let value = match &self.fields[field.index()] {
                Some(FieldData::Eager(value)) => value.clone(),
                Some(FieldData::Deferred(lazy)) => lazy
                    .resolve()
                    .map_err(|e| e.at_field_write(&qualified))?
                    .clone(),
                None => field.codec().default_value(&ctx),
            };
            let value = field
                .codec()
                .final_value(value, &ctx)
                .map_err(|e| e.at_field_write(&qualified))?;
            ctx.set_value(field.name(), value)?;
        }

        if let Some(hook) = &def.finalize_hook {
            hook(&mut ctx)?;
        }
        // A failing check aborts before any byte is written.
        def.run_checks(&ctx)?;

        for field in def.registry.iter() {
            let qualified = def.qualify(field.name());
            let at = stream.position()?;
            let offset = field
                .codec()
                .seek_start(stream, &ctx, field.offset_policy(), at)
                .map_err(|e| e.at_field_write(&qualified))?;
            ctx.set_offset(field.index(), offset);

            let value = ctx.value(field.name()).cloned().ok_or_else(|| {
                StructError::Value(format!("field '{}' has no final value", field.name()))
            })?;
            let written = field
                .codec()
                .encode(stream, &value, &mut ctx)
                .map_err(|e| e.at_field_write(&qualified))?;
            ctx.resolve(field.index(), value, written);
            ctx.observe_offset(offset + written);
            ctx.observe_offset(stream.position()?);
        }

        stream.finalize()?;
        ctx.observe_offset(stream.position()?);
        ctx.finish();
        Ok(ctx.max_offset() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BitsField, RemainingBytesField, UIntField};

    fn triple() -> Arc<StructDef> {
        StructBuilder::new("Triple")
            .field("a", UIntField::new(1))
            .field("b", UIntField::new(2))
            .field("c", UIntField::new(4))
            .build()
            .unwrap()
    }

    #[test]
    fn test_static_length() {
        assert_eq!(triple().static_length().unwrap(), 7);
    }

    #[test]
    fn test_static_length_idempotent() {
        let def = triple();
        assert_eq!(
            def.static_length().unwrap(),
            def.static_length().unwrap()
        );
    }

    #[test]
    fn test_static_length_impossible() {
        let def = StructBuilder::new("Unbounded")
            .field("tail", RemainingBytesField::new())
            .build()
            .unwrap();
        let first = def.static_length().unwrap_err();
        let second = def.static_length().unwrap_err();
        for err in [first, second] {
            match err {
                StructError::ImpossibleToCalculateLength(name) => {
                    assert_eq!(name, "Unbounded")
                }
                other => panic!("Expected ImpossibleToCalculateLength, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_as_cstruct() {
        let def = StructBuilder::new("Header")
            .field("magic", UIntField::new(4))
            .field("flags", BitsField::new(3))
            .build()
            .unwrap();
        let rendered = def.as_cstruct();
        assert_eq!(
            rendered,
            "typedef struct Header {\n    uint32_t magic;\n    uint8_t flags : 3;\n} Header;\n"
        );
    }

    #[test]
    fn test_unset_fields_encode_as_defaults() {
        let def = triple();
        let instance = def.instance();
        let bytes = instance.to_bytes().unwrap();
        assert_eq!(bytes, vec![0u8; 7]);
    }

    #[test]
    fn test_set_unknown_field() {
        let def = triple();
        let mut instance = def.instance();
        assert!(matches!(
            instance.set("missing", 1u64),
            Err(StructError::FieldNotFound(_))
        ));
    }
}
