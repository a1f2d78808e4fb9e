//! Raw byte-run field types.

use crate::bitstream::BitStream;
use crate::context::ParsingContext;
use crate::error::{Result, StructError};
use crate::field::FieldCodec;
use crate::value::Value;

/// Fixed-length run of raw bytes. Lazy-capable: its end is always known
/// without decoding.
#[derive(Debug, Clone)]
pub struct BytesField {
    len: usize,
}

impl BytesField {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    fn check_len(&self, value: &Value) -> Result<()> {
        let bytes = value.as_bytes()?;
        if bytes.len() != self.len {
            return Err(StructError::Value(format!(
                "expected {} bytes, got {}",
                self.len,
                bytes.len()
            )));
        }
        Ok(())
    }
}

impl FieldCodec for BytesField {
    fn default_value(&self, _ctx: &ParsingContext<'_>) -> Value {
        Value::Bytes(vec![0; self.len])
    }

    fn fixed_bits(&self) -> Option<u64> {
        Some(self.len as u64 * 8)
    }

    fn decode(
        &self,
        stream: &mut BitStream<'_>,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<(Value, u64)> {
        let mut buf = vec![0u8; self.len];
        stream.read_exact(&mut buf)?;
        Ok((Value::Bytes(buf), self.len as u64))
    }

    fn decode_lazy(&self, raw: &[u8]) -> Result<Value> {
        if raw.len() != self.len {
            return Err(StructError::Value(format!(
                "expected {} raw bytes, got {}",
                self.len,
                raw.len()
            )));
        }
        Ok(Value::Bytes(raw.to_vec()))
    }

    fn encode(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<u64> {
        self.check_len(value)?;
        stream.write_all(value.as_bytes()?)?;
        Ok(self.len as u64)
    }

    fn c_decl(&self, name: &str) -> String {
        format!("uint8_t {}[{}]", name, self.len)
    }
}

/// Greedy, unbounded byte run: consumes every remaining byte of the stream.
///
/// Reports no fixed size, so any structure containing one cannot answer the
/// static length query. Never eligible for lazy deferral (no computable end).
#[derive(Debug, Clone, Default)]
pub struct RemainingBytesField;

impl RemainingBytesField {
    pub fn new() -> Self {
        Self
    }
}

impl FieldCodec for RemainingBytesField {
    fn default_value(&self, _ctx: &ParsingContext<'_>) -> Value {
        Value::Bytes(Vec::new())
    }

    fn fixed_bits(&self) -> Option<u64> {
        None
    }

    fn decode(
        &self,
        stream: &mut BitStream<'_>,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<(Value, u64)> {
        let mut buf = Vec::new();
        let consumed = stream.read_to_end(&mut buf)? as u64;
        Ok((Value::Bytes(buf), consumed))
    }

    fn encode(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<u64> {
        let bytes = value.as_bytes()?;
        stream.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }

    fn c_decl(&self, name: &str) -> String {
        format!("uint8_t {}[]", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldRegistry;
    use std::io::Cursor;

    #[test]
    fn test_fixed_bytes_roundtrip() {
        let registry = FieldRegistry::new();
        let field = BytesField::new(3);
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut ctx = ParsingContext::new(&registry, "Blob", 1, 0);
            let mut stream = BitStream::new(&mut cursor);
            field
                .encode(&mut stream, &Value::Bytes(vec![1, 2, 3]), &mut ctx)
                .unwrap();
        }
        cursor.set_position(0);
        let mut ctx = ParsingContext::new(&registry, "Blob", 1, 0);
        let mut stream = BitStream::new(&mut cursor);
        let (value, consumed) = field.decode(&mut stream, &mut ctx).unwrap();
        assert_eq!(value, Value::Bytes(vec![1, 2, 3]));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_fixed_bytes_length_mismatch() {
        let registry = FieldRegistry::new();
        let field = BytesField::new(3);
        let mut cursor = Cursor::new(Vec::new());
        let mut ctx = ParsingContext::new(&registry, "Blob", 1, 0);
        let mut stream = BitStream::new(&mut cursor);
        assert!(field
            .encode(&mut stream, &Value::Bytes(vec![1]), &mut ctx)
            .is_err());
    }

    #[test]
    fn test_remaining_bytes_consumes_to_eof() {
        let registry = FieldRegistry::new();
        let field = RemainingBytesField::new();
        let mut cursor = Cursor::new(vec![9, 8, 7, 6]);
        let mut ctx = ParsingContext::new(&registry, "Tail", 1, 0);
        let mut stream = BitStream::new(&mut cursor);
        let (value, consumed) = field.decode(&mut stream, &mut ctx).unwrap();
        assert_eq!(value, Value::Bytes(vec![9, 8, 7, 6]));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_remaining_bytes_has_no_fixed_size() {
        let field = RemainingBytesField::new();
        assert_eq!(field.fixed_bits(), None);
        let mut cursor = Cursor::new(vec![0u8; 4]);
        let mut stream = BitStream::new(&mut cursor);
        assert_eq!(field.seek_end(&mut stream, 0).unwrap(), None);
    }
}
