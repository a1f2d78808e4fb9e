//! Bit-granular stream wrapper.
//!
//! [`BitStream`] wraps any byte-oriented seekable stream and adds
//! bit-addressable reads and writes on top of the normal byte operations.
//! Bits are transferred MSB-first: the first bit read from or written to a
//! byte is its high bit. Partial bytes are buffered; [`BitStream::finalize`]
//! zero-pads and flushes a trailing partial byte after an encode.

use crate::error::{Result, StructError};
use std::io::{Read, Seek, SeekFrom, Write};

/// The byte-oriented stream contract the engine operates on.
///
/// Blanket-implemented for anything that is readable, writable, and seekable,
/// e.g. `std::io::Cursor<Vec<u8>>` or `std::fs::File`.
pub trait ByteStream: Read + Write + Seek {}

impl<T: Read + Write + Seek> ByteStream for T {}

/// A bit-granular view over a borrowed byte stream.
///
/// The partial-byte buffers are private to the borrow; a `BitStream` is
/// created per decode or encode operation and never shared.
pub struct BitStream<'a> {
    inner: &'a mut dyn ByteStream,
    /// Partially consumed byte from the read side
    rbuf: u8,
    /// Unconsumed bits remaining in `rbuf` (0 = byte-aligned)
    rbits: u8,
    /// Partially assembled byte on the write side
    wbuf: u8,
    /// Bits accumulated in `wbuf` (0 = byte-aligned)
    wbits: u8,
}

impl<'a> BitStream<'a> {
    /// Wraps a byte stream. The cursor starts wherever the stream is.
    pub fn new(inner: &'a mut dyn ByteStream) -> Self {
        Self {
            inner,
            rbuf: 0,
            rbits: 0,
            wbuf: 0,
            wbits: 0,
        }
    }

    /// Logical byte position: the offset of the byte containing the bit
    /// cursor. While mid-byte on the read side the underlying stream is one
    /// byte ahead; a buffered partial write byte has not advanced it yet.
    pub fn position(&mut self) -> Result<u64> {
        let pos = self.inner.stream_position()?;
        Ok(pos - u64::from(self.rbits > 0))
    }

    /// Seeks to an absolute byte offset. Any pending partial write byte is
    /// padded and flushed first; a partially consumed read byte is discarded.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        self.flush_partial()?;
        self.rbits = 0;
        self.rbuf = 0;
        Ok(self.inner.seek(SeekFrom::Start(pos))?)
    }

    /// Reads `n` bits (0..=64) as an unsigned value, MSB-first.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(StructError::BitWidth(n));
        }

        let mut value = 0u64;
        for _ in 0..n {
            if self.rbits == 0 {
                let mut byte = [0u8; 1];
                self.inner.read_exact(&mut byte)?;
                self.rbuf = byte[0];
                self.rbits = 8;
            }
            self.rbits -= 1;
            let bit = (self.rbuf >> self.rbits) & 1;
            value = (value << 1) | u64::from(bit);
        }

        Ok(value)
    }

    /// Writes the low `n` bits (0..=64) of `value`, MSB-first, buffering
    /// into the current byte until it fills.
    pub fn write_bits(&mut self, value: u64, n: u32) -> Result<()> {
        if n > 64 {
            return Err(StructError::BitWidth(n));
        }

        for i in (0..n).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.wbuf = (self.wbuf << 1) | bit;
            self.wbits += 1;
            if self.wbits == 8 {
                self.inner.write_all(&[self.wbuf])?;
                self.wbuf = 0;
                self.wbits = 0;
            }
        }

        Ok(())
    }

    /// Fills `buf` with whole bytes. Fails while mid-byte on the read side.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.rbits != 0 {
            return Err(StructError::UnalignedAccess);
        }
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Reads every remaining byte of the stream.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        if self.rbits != 0 {
            return Err(StructError::UnalignedAccess);
        }
        Ok(self.inner.read_to_end(buf)?)
    }

    /// Writes whole bytes. Fails while a partial byte is buffered.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.wbits != 0 {
            return Err(StructError::UnalignedAccess);
        }
        self.inner.write_all(buf)?;
        Ok(())
    }

    /// Flushes any partially filled trailing byte (zero-padded) and the
    /// underlying stream. Returns how many bytes the flush emitted; a no-op
    /// on byte-aligned streams.
    pub fn finalize(&mut self) -> Result<u64> {
        let flushed = self.flush_partial()?;
        self.inner.flush()?;
        Ok(flushed)
    }

    fn flush_partial(&mut self) -> Result<u64> {
        if self.wbits == 0 {
            return Ok(0);
        }
        let byte = self.wbuf << (8 - self.wbits);
        self.inner.write_all(&[byte])?;
        self.wbuf = 0;
        self.wbits = 0;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_bits_msb_first() {
        let mut cursor = Cursor::new(vec![0b1011_0001u8]);
        let mut stream = BitStream::new(&mut cursor);
        assert_eq!(stream.read_bits(3).unwrap(), 0b101);
        assert_eq!(stream.read_bits(5).unwrap(), 0b10001);
    }

    #[test]
    fn test_write_bits_packs_one_byte() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut stream = BitStream::new(&mut cursor);
            stream.write_bits(0b101, 3).unwrap();
            stream.write_bits(0b10001, 5).unwrap();
            assert_eq!(stream.finalize().unwrap(), 0);
        }
        assert_eq!(cursor.into_inner(), vec![0b1011_0001]);
    }

    #[test]
    fn test_finalize_pads_partial_byte() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut stream = BitStream::new(&mut cursor);
            stream.write_bits(0b11, 2).unwrap();
            assert_eq!(stream.finalize().unwrap(), 1);
        }
        assert_eq!(cursor.into_inner(), vec![0b1100_0000]);
    }

    #[test]
    fn test_position_mid_byte() {
        let mut cursor = Cursor::new(vec![0xff, 0x00]);
        let mut stream = BitStream::new(&mut cursor);
        assert_eq!(stream.position().unwrap(), 0);
        stream.read_bits(3).unwrap();
        assert_eq!(stream.position().unwrap(), 0);
        stream.read_bits(5).unwrap();
        assert_eq!(stream.position().unwrap(), 1);
    }

    #[test]
    fn test_seek_flushes_partial_write() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut stream = BitStream::new(&mut cursor);
            stream.write_bits(0b1, 1).unwrap();
            stream.seek(4).unwrap();
            stream.write_all(&[0xaa]).unwrap();
        }
        let data = cursor.into_inner();
        assert_eq!(data[0], 0b1000_0000);
        assert_eq!(data[4], 0xaa);
    }

    #[test]
    fn test_unaligned_byte_read_rejected() {
        let mut cursor = Cursor::new(vec![0xff, 0xff]);
        let mut stream = BitStream::new(&mut cursor);
        stream.read_bits(1).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(
            stream.read_exact(&mut buf),
            Err(StructError::UnalignedAccess)
        ));
    }

    #[test]
    fn test_too_many_bits() {
        let mut cursor = Cursor::new(vec![0u8; 16]);
        let mut stream = BitStream::new(&mut cursor);
        assert!(matches!(
            stream.read_bits(65),
            Err(StructError::BitWidth(65))
        ));
    }

    #[test]
    fn test_zero_bits_is_noop() {
        let mut cursor = Cursor::new(vec![0xffu8]);
        let mut stream = BitStream::new(&mut cursor);
        assert_eq!(stream.read_bits(0).unwrap(), 0);
        assert_eq!(stream.position().unwrap(), 0);
    }
}
