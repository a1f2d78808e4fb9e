//! Sub-byte bit-field type.

use crate::bitstream::BitStream;
use crate::context::ParsingContext;
use crate::error::{Result, StructError};
use crate::field::FieldCodec;
use crate::value::Value;

/// Unsigned bit-field of 1 to 64 bits, packed MSB-first against adjacent
/// bit-fields. Consecutive `BitsField`s share bytes; a trailing partial byte
/// is padded by the stream's `finalize` step.
///
/// Not lazy-capable: a bit-field whose width is not a whole number of bytes
/// has no byte-addressable end, so `seek_end` reports `None` for it.
#[derive(Debug, Clone)]
pub struct BitsField {
    bits: u32,
}

impl BitsField {
    /// Creates a bit-field of `bits` width (1..=64).
    ///
    /// # Panics
    ///
    /// Panics on a width outside 1..=64.
    pub fn new(bits: u32) -> Self {
        assert!((1..=64).contains(&bits), "bit width must be 1..=64");
        Self { bits }
    }

    fn check_range(&self, v: u64) -> Result<()> {
        if self.bits < 64 && v >> self.bits != 0 {
            return Err(StructError::Value(format!(
                "{} does not fit in {} bits",
                v, self.bits
            )));
        }
        Ok(())
    }
}

impl FieldCodec for BitsField {
    fn default_value(&self, _ctx: &ParsingContext<'_>) -> Value {
        Value::UInt(0)
    }

    fn fixed_bits(&self) -> Option<u64> {
        Some(u64::from(self.bits))
    }

    fn decode(
        &self,
        stream: &mut BitStream<'_>,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<(Value, u64)> {
        let before = stream.position()?;
        let value = stream.read_bits(self.bits)?;
        let after = stream.position()?;
        Ok((Value::UInt(value), after - before))
    }

    fn encode(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<u64> {
        let v = value.as_uint()?;
        self.check_range(v)?;
        let before = stream.position()?;
        stream.write_bits(v, self.bits)?;
        let after = stream.position()?;
        Ok(after - before)
    }

    fn c_decl(&self, name: &str) -> String {
        let storage = match self.bits {
            1..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            _ => 64,
        };
        format!("uint{}_t {} : {}", storage, name, self.bits)
    }
}
