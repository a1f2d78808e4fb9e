//! Declarative binary structure decoding and encoding.
//!
//! This library turns an ordered schema of typed field descriptors into exact
//! byte/bit-level reads and writes. A structure type is defined once with
//! [`StructBuilder`]; decoding ([`StructDef::from_stream`]) and encoding
//! ([`StructInstance::to_stream`]) are symmetric two-phase algorithms that
//! support lazy (deferred) field resolution, absolute and relative offset
//! seeking, alignment padding, and post-decode validation checks.
//!
//! # Features
//!
//! - Ordered, immutable-after-build field registry with neighbor queries
//! - Bit-granular stream wrapper over any `Read + Write + Seek` stream
//! - Two-phase decode: absolute-offset fields are pre-positioned so
//!   earlier-declared fields can reference later-declared ones
//! - Lazy fields: only the length is computed during decode; the value is
//!   materialized on first access
//! - Named check predicates that abort decode before an instance is built
//!   and encode before a byte is written
//! - Static length query over the whole schema, all-or-nothing
//!
//! # Example
//!
//! ```
//! use bytestruct::fields::UIntField;
//! use bytestruct::{StructBuilder, Value};
//!
//! let def = StructBuilder::new("Sample")
//!     .field("kind", UIntField::new(1))
//!     .field("count", UIntField::new(2))
//!     .field("total", UIntField::new(4))
//!     .build()?;
//!
//! let mut instance = def.instance();
//! instance.set("kind", 1u64)?;
//! instance.set("count", 300u64)?;
//! instance.set("total", 70000u64)?;
//!
//! let bytes = instance.to_bytes()?;
//! assert_eq!(bytes.len(), 7);
//!
//! let decoded = def.from_bytes(&bytes)?;
//! assert_eq!(decoded.get("count")?, &Value::UInt(300));
//! # Ok::<(), bytestruct::StructError>(())
//! ```
//!
//! # Failure model
//!
//! Any error while seeking, decoding, or encoding a single field aborts the
//! entire structure and surfaces as [`StructError::Parse`] or
//! [`StructError::Write`] naming the fully-qualified field, with the original
//! error preserved as the cause. There is no partial-result recovery: byte
//! offsets downstream may already depend on the failed field's outcome.
//!
//! # Concurrency
//!
//! The engine is single-threaded, synchronous, and blocking. Every decode or
//! encode call owns a private parsing context for its duration; nothing is
//! shared between concurrent calls. Structure definitions themselves are
//! immutable and shared via `Arc`.

pub mod bitstream;
pub mod context;
pub mod error;
pub mod field;
pub mod fields;
pub mod registry;
pub mod structure;
pub mod value;

pub use bitstream::{BitStream, ByteStream};
pub use context::{FieldSlot, ParsingContext, ResolutionState};
pub use error::{Result, StructError};
pub use field::{FieldCodec, FieldDescriptor, FieldInfo, OffsetPolicy};
pub use registry::FieldRegistry;
pub use structure::{FieldData, LazyValue, StructBuilder, StructDef, StructInstance};
pub use value::Value;
