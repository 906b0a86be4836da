//! Binary encoding for transaction records.
//!
//! Integers are written as LEB128 varints: seven bits per byte, least
//! significant group first, high bit set on every byte except the last.
//! Signed values are encoded through their two's-complement bit pattern, so
//! negative numbers always take the maximum width (10 bytes for 64-bit, 5 bytes
//! for 32-bit).
//!
//! Composite objects are wrapped in a versioned envelope:
//!
//! ```text
//! Envelope := version:vi64  payload_len:vi64  payload:bytes[payload_len]
//! ```
//!
//! The payload is decoded from its own sub-reader starting at offset 0, and
//! the outer reader always advances by `payload_len`, no matter how many bytes
//! the nested decode consumed.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Envelope version written by this build
pub const UNIS_VERSION: i64 = 1;

/// Maximum encoded width of a 64-bit varint
pub const MAX_VI64_LEN: usize = 10;

/// Maximum encoded width of a 32-bit varint
pub const MAX_VI32_LEN: usize = 5;

/// Encoded width of `value` as a 64-bit varint
pub const fn encoded_length_vi64(value: i64) -> usize {
    let mut v = value as u64;
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Encoded width of `value` as a 32-bit varint
pub const fn encoded_length_vi32(value: i32) -> usize {
    let mut v = value as u32;
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Encoded width of an envelope carrying `payload_len` bytes
pub const fn envelope_len(payload_len: usize) -> usize {
    encoded_length_vi64(UNIS_VERSION) + encoded_length_vi64(payload_len as i64) + payload_len
}

/// Types with an exact, precomputable binary encoding
pub trait Encode {
    /// Number of bytes [`Encode::encode`] will write
    fn encoded_len(&self) -> usize;

    /// Write the encoding at the writer's position
    fn encode(&self, w: &mut Writer<'_>) -> Result<()>;

    /// Encode into a freshly allocated buffer of exactly `encoded_len()` bytes
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let len = self.encoded_len();
        let mut buf = vec![0u8; len.max(1)];
        let mut w = Writer::new(&mut buf)?;
        self.encode(&mut w)?;
        if w.pos() != len {
            return Err(Error::unexpected(format!(
                "encoded {} bytes but predicted {}",
                w.pos(),
                len
            )));
        }
        buf.truncate(len);
        Ok(buf)
    }
}

/// Types that decode without external resources
pub trait Decode: Sized {
    /// Read a value at the reader's position
    fn decode(r: &mut Reader<'_>) -> Result<Self>;
}

/// Cursor over a fixed output buffer
#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Create a writer at position 0
    ///
    /// Fails with `InvalidArgument` for an empty buffer.
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        Self::with_pos(buf, 0)
    }

    /// Create a writer that continues at `pos`
    pub fn with_pos(buf: &'a mut [u8], pos: usize) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::invalid_argument("empty output buffer"));
        }
        if pos > buf.len() {
            return Err(Error::invalid_argument(format!(
                "position {} beyond buffer of {} bytes",
                pos,
                buf.len()
            )));
        }
        Ok(Self { buf, pos })
    }

    /// Current position
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    fn reserve(&mut self, needed: usize) -> Result<&mut [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(Error::BufNotEnough { needed, remaining });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&mut self.buf[start..start + needed])
    }

    /// Write a 64-bit varint
    pub fn put_vi64(&mut self, value: i64) -> Result<()> {
        let out = self.reserve(encoded_length_vi64(value))?;
        let mut v = value as u64;
        for byte in out.iter_mut() {
            *byte = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                *byte |= 0x80;
            }
        }
        Ok(())
    }

    /// Write a 32-bit varint
    pub fn put_vi32(&mut self, value: i32) -> Result<()> {
        let out = self.reserve(encoded_length_vi32(value))?;
        let mut v = value as u32;
        for byte in out.iter_mut() {
            *byte = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                *byte |= 0x80;
            }
        }
        Ok(())
    }

    /// Write a fixed-width little-endian i64
    pub fn put_i64_le(&mut self, value: i64) -> Result<()> {
        let out = self.reserve(8)?;
        LittleEndian::write_i64(out, value);
        Ok(())
    }

    /// Write an envelope header followed by a payload of `payload_len` bytes.
    ///
    /// `body` must write exactly `payload_len` bytes; a mismatch means the
    /// size accounting is broken and is reported as `Unexpected`.
    pub fn put_envelope<F>(&mut self, payload_len: usize, body: F) -> Result<()>
    where
        F: FnOnce(&mut Writer<'_>) -> Result<()>,
    {
        self.put_vi64(UNIS_VERSION)?;
        self.put_vi64(payload_len as i64)?;
        let start = self.pos;
        body(self)?;
        let written = self.pos - start;
        if written != payload_len {
            tracing::error!(
                written,
                predicted = payload_len,
                "envelope payload size does not match prediction"
            );
            return Err(Error::unexpected(format!(
                "payload wrote {} bytes, predicted {}",
                written, payload_len
            )));
        }
        Ok(())
    }
}

/// Cursor over an input buffer
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader at position 0
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current position
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes not consumed yet
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte has been consumed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read a 64-bit varint
    pub fn get_vi64(&mut self) -> Result<i64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VI64_LEN {
            let byte = *self
                .buf
                .get(self.pos + i)
                .ok_or_else(|| Error::deserialize(format!("truncated varint at {}", self.pos)))?;
            if i == MAX_VI64_LEN - 1 && byte > 0x01 {
                return Err(Error::deserialize(format!("varint overflow at {}", self.pos)));
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(value as i64);
            }
        }
        Err(Error::deserialize(format!("varint overflow at {}", self.pos)))
    }

    /// Read a 32-bit varint
    pub fn get_vi32(&mut self) -> Result<i32> {
        let mut value: u32 = 0;
        for i in 0..MAX_VI32_LEN {
            let byte = *self
                .buf
                .get(self.pos + i)
                .ok_or_else(|| Error::deserialize(format!("truncated varint at {}", self.pos)))?;
            if i == MAX_VI32_LEN - 1 && byte > 0x0f {
                return Err(Error::deserialize(format!("varint overflow at {}", self.pos)));
            }
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(value as i32);
            }
        }
        Err(Error::deserialize(format!("varint overflow at {}", self.pos)))
    }

    /// Read a fixed-width little-endian i64
    pub fn get_i64_le(&mut self) -> Result<i64> {
        if self.remaining() < 8 {
            return Err(Error::deserialize(format!(
                "need 8 bytes at {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let value = LittleEndian::read_i64(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(value)
    }

    /// Read an envelope header and split off its payload.
    ///
    /// Returns a reader over exactly `payload_len` bytes. The outer reader is
    /// advanced past the payload before returning, so trailing bytes the
    /// caller leaves unread inside the payload are skipped.
    pub fn get_envelope(&mut self) -> Result<Reader<'a>> {
        let version = self.get_vi64()?;
        if version != UNIS_VERSION {
            return Err(Error::VersionMismatch {
                expected: UNIS_VERSION,
                actual: version,
            });
        }
        let declared = self.get_vi64()?;
        let remaining = self.remaining();
        if declared < 0 || declared as u64 > remaining as u64 {
            return Err(Error::InvalidSize {
                declared,
                remaining,
            });
        }
        let len = declared as usize;
        let payload = Reader::new(&self.buf[self.pos..self.pos + len]);
        self.pos += len;
        Ok(payload)
    }
}
