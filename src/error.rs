//! Error types for the binary structure engine.

use thiserror::Error;

/// Result type alias for structure operations.
pub type Result<T> = std::result::Result<T, StructError>;

/// Errors that can occur while defining, decoding, or encoding structures.
#[derive(Error, Debug)]
pub enum StructError {
    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A field failed to seek or decode during `from_stream`.
    /// Names the fully-qualified field and preserves the original cause.
    #[error("failed to decode field '{field}': {source}")]
    Parse {
        field: String,
        #[source]
        source: Box<StructError>,
    },

    /// A field failed to seek or encode during `to_stream`.
    #[error("failed to encode field '{field}': {source}")]
    Write {
        field: String,
        #[source]
        source: Box<StructError>,
    },

    /// A check predicate over the fully-populated context returned false
    #[error("check '{check}' failed for struct '{structure}'")]
    Check { structure: String, check: String },

    /// At least one field cannot report a fixed size, so the structure's
    /// total length cannot be computed statically
    #[error("cannot compute a static length for struct '{0}'")]
    ImpossibleToCalculateLength(String),

    /// Lookup of a field name that was never registered
    #[error("field '{0}' not found")]
    FieldNotFound(String),

    /// A bit-granular read or write of more than 64 bits was requested
    #[error("cannot transfer {0} bits at once (maximum is 64)")]
    BitWidth(u32),

    /// A byte-level stream operation was attempted while a partial byte
    /// of buffered bits was outstanding
    #[error("byte-level access on a bit-misaligned stream")]
    UnalignedAccess,

    /// A value had the wrong variant or was out of range for its field
    #[error("value error: {0}")]
    Value(String),
}

impl StructError {
    /// Wraps an error as a decode failure of the named field, unless it is
    /// already a field-level wrapper (nested structures keep the innermost
    /// qualified name first).
    pub(crate) fn at_field(self, field: &str) -> StructError {
        match self {
            wrapped @ StructError::Parse { .. } => wrapped,
            other => StructError::Parse {
                field: field.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Symmetric to [`StructError::at_field`] for the encode path.
    pub(crate) fn at_field_write(self, field: &str) -> StructError {
        match self {
            wrapped @ StructError::Write { .. } => wrapped,
            other => StructError::Write {
                field: field.to_string(),
                source: Box::new(other),
            },
        }
    }
}
