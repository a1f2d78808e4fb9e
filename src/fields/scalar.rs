//! Fixed-width integer field types.

use crate::bitstream::BitStream;
use crate::context::ParsingContext;
use crate::error::{Result, StructError};
use crate::field::FieldCodec;
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of a multi-byte integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Unsigned integer field of 1 to 8 bytes.
#[derive(Debug, Clone)]
pub struct UIntField {
    width: usize,
    endian: Endianness,
}

impl UIntField {
    /// Creates a little-endian unsigned field of `width` bytes (1..=8).
    ///
    /// # Panics
    ///
    /// Panics on a width outside 1..=8.
    pub fn new(width: usize) -> Self {
        assert!((1..=8).contains(&width), "integer width must be 1..=8 bytes");
        Self {
            width,
            endian: Endianness::Little,
        }
    }

    /// Switches the field to big-endian byte order.
    pub fn big_endian(mut self) -> Self {
        self.endian = Endianness::Big;
        self
    }

    fn read(&self, buf: &[u8]) -> u64 {
        match self.endian {
            Endianness::Little => LittleEndian::read_uint(buf, self.width),
            Endianness::Big => BigEndian::read_uint(buf, self.width),
        }
    }

    fn check_range(&self, v: u64) -> Result<()> {
        if self.width < 8 && v >> (self.width * 8) != 0 {
            return Err(StructError::Value(format!(
                "{} does not fit in {} unsigned bytes",
                v, self.width
            )));
        }
        Ok(())
    }
}

impl FieldCodec for UIntField {
    fn default_value(&self, _ctx: &ParsingContext<'_>) -> Value {
        Value::UInt(0)
    }

    fn fixed_bits(&self) -> Option<u64> {
        Some(self.width as u64 * 8)
    }

    fn decode(
        &self,
        stream: &mut BitStream<'_>,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<(Value, u64)> {
        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf[..self.width])?;
        Ok((Value::UInt(self.read(&buf[..self.width])), self.width as u64))
    }

    fn decode_lazy(&self, raw: &[u8]) -> Result<Value> {
        if raw.len() != self.width {
            return Err(StructError::Value(format!(
                "expected {} raw bytes, got {}",
                self.width,
                raw.len()
            )));
        }
        Ok(Value::UInt(self.read(raw)))
    }

    fn encode(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<u64> {
        let v = value.as_uint()?;
        self.check_range(v)?;
        let mut buf = [0u8; 8];
        match self.endian {
            Endianness::Little => LittleEndian::write_uint(&mut buf[..self.width], v, self.width),
            Endianness::Big => BigEndian::write_uint(&mut buf[..self.width], v, self.width),
        }
        stream.write_all(&buf[..self.width])?;
        Ok(self.width as u64)
    }

    fn c_decl(&self, name: &str) -> String {
        match self.width {
            1 => format!("uint8_t {}", name),
            2 => format!("uint16_t {}", name),
            4 => format!("uint32_t {}", name),
            8 => format!("uint64_t {}", name),
            w => format!("uint8_t {}[{}]", name, w),
        }
    }
}

/// Signed (two's complement) integer field of 1 to 8 bytes.
#[derive(Debug, Clone)]
pub struct IntField {
    width: usize,
    endian: Endianness,
}

impl IntField {
    /// Creates a little-endian signed field of `width` bytes (1..=8).
    ///
    /// # Panics
    ///
    /// Panics on a width outside 1..=8.
    pub fn new(width: usize) -> Self {
        assert!((1..=8).contains(&width), "integer width must be 1..=8 bytes");
        Self {
            width,
            endian: Endianness::Little,
        }
    }

    /// Switches the field to big-endian byte order.
    pub fn big_endian(mut self) -> Self {
        self.endian = Endianness::Big;
        self
    }

    fn read(&self, buf: &[u8]) -> i64 {
        match self.endian {
            Endianness::Little => LittleEndian::read_int(buf, self.width),
            Endianness::Big => BigEndian::read_int(buf, self.width),
        }
    }

    fn check_range(&self, v: i64) -> Result<()> {
        if self.width < 8 {
            let bits = self.width as u32 * 8;
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            if v < min || v > max {
                return Err(StructError::Value(format!(
                    "{} does not fit in {} signed bytes",
                    v, self.width
                )));
            }
        }
        Ok(())
    }
}

impl FieldCodec for IntField {
    fn default_value(&self, _ctx: &ParsingContext<'_>) -> Value {
        Value::Int(0)
    }

    fn fixed_bits(&self) -> Option<u64> {
        Some(self.width as u64 * 8)
    }

    fn decode(
        &self,
        stream: &mut BitStream<'_>,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<(Value, u64)> {
        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf[..self.width])?;
        Ok((Value::Int(self.read(&buf[..self.width])), self.width as u64))
    }

    fn decode_lazy(&self, raw: &[u8]) -> Result<Value> {
        if raw.len() != self.width {
            return Err(StructError::Value(format!(
                "expected {} raw bytes, got {}",
                self.width,
                raw.len()
            )));
        }
        Ok(Value::Int(self.read(raw)))
    }

    fn encode(
        &self,
        stream: &mut BitStream<'_>,
        value: &Value,
        _ctx: &mut ParsingContext<'_>,
    ) -> Result<u64> {
        let v = value.as_int()?;
        self.check_range(v)?;
        let mut buf = [0u8; 8];
        match self.endian {
            Endianness::Little => LittleEndian::write_int(&mut buf[..self.width], v, self.width),
            Endianness::Big => BigEndian::write_int(&mut buf[..self.width], v, self.width),
        }
        stream.write_all(&buf[..self.width])?;
        Ok(self.width as u64)
    }

    fn c_decl(&self, name: &str) -> String {
        match self.width {
            1 => format!("int8_t {}", name),
            2 => format!("int16_t {}", name),
            4 => format!("int32_t {}", name),
            8 => format!("int64_t {}", name),
            w => format!("int8_t {}[{}]", name, w),
        }
    }
}
