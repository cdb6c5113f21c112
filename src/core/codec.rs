//! Message Codec
//!
//! Length-prefixed, tagged messages as they appear inside a GameData frame.
//!
//! ```text
//! ┌────────────┬──────────┬──────────────────────┐
//! │ len: u16le │ tag: u8  │ body: [u8; len]      │
//! └────────────┴──────────┴──────────────────────┘
//! ```
//!
//! Integers inside bodies are either fixed little-endian or "packed"
//! (7 bits per byte, high bit = continuation).

use thiserror::Error;

use super::vec2::Vector2;

/// Size of a message header (length + tag).
pub const MESSAGE_HEADER_LEN: usize = 3;

/// Codec errors. Every read is bounds-checked; none of these panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Ran off the end of the buffer.
    #[error("unexpected end of message: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes requested.
        needed: usize,
        /// Bytes left in the reader.
        remaining: usize,
    },

    /// Packed integer used more than five bytes.
    #[error("packed integer is too long")]
    PackedIntOverflow,

    /// String was not valid UTF-8.
    #[error("invalid utf-8 string")]
    InvalidUtf8,

    /// `end_message` without a matching `start_message`.
    #[error("no open message to end")]
    NoOpenMessage,

    /// Message body does not fit in a u16 length.
    #[error("message body too large: {0} bytes")]
    MessageTooLarge(usize),
}

// =============================================================================
// READER
// =============================================================================

/// Cursor over a message body.
#[derive(Debug, Clone)]
pub struct MessageReader<'a> {
    tag: u8,
    buf: &'a [u8],
    pos: usize,
}

/// A nested message read out of a parent reader.
#[derive(Debug, Clone)]
pub struct RawMessage<'a> {
    /// Reader over the body only.
    pub reader: MessageReader<'a>,
    /// Header and body exactly as received.
    pub raw: &'a [u8],
}

impl<'a> MessageReader<'a> {
    /// Reader over an untagged buffer (tag 0).
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_tag(0, buf)
    }

    /// Reader over a message body with a known tag.
    pub fn with_tag(tag: u8, buf: &'a [u8]) -> Self {
        Self { tag, buf, pos: 0 }
    }

    /// Tag of this message.
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total body length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whole body as a slice, independent of position.
    pub fn body(&self) -> &'a [u8] {
        self.buf
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a bool (any non-zero byte is true).
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a little-endian f32.
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read a packed (7-bit varint) u32.
    pub fn read_packed_u32(&mut self) -> Result<u32, CodecError> {
        let mut value: u32 = 0;
        let mut shift = 0;
        loop {
            if shift > 28 {
                return Err(CodecError::PackedIntOverflow);
            }
            let byte = self.read_u8()?;
            value |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read a packed i32 (bit-cast of the packed u32).
    pub fn read_packed_i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.read_packed_u32()? as i32)
    }

    /// Read a packed-length UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_packed_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Read a compressed position vector.
    pub fn read_vector2(&mut self) -> Result<Vector2, CodecError> {
        let x = self.read_u16()?;
        let y = self.read_u16()?;
        Ok(Vector2::decompress(x, y))
    }

    /// Read a nested message.
    pub fn read_message(&mut self) -> Result<RawMessage<'a>, CodecError> {
        let start = self.pos;
        let len = self.read_u16()? as usize;
        let tag = self.read_u8()?;
        let body = self.read_bytes(len)?;
        Ok(RawMessage {
            reader: MessageReader::with_tag(tag, body),
            raw: &self.buf[start..self.pos],
        })
    }
}

// =============================================================================
// WRITER
// =============================================================================

/// Growable message writer with nested message support.
#[derive(Debug, Default, Clone)]
pub struct MessageWriter {
    buf: Vec<u8>,
    open: Vec<usize>,
}

impl MessageWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write one byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a bool.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Write a little-endian u16.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Write a packed u32.
    pub fn write_packed_u32(&mut self, mut value: u32) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Write a packed i32.
    pub fn write_packed_i32(&mut self, value: i32) {
        self.write_packed_u32(value as u32);
    }

    /// Write a packed-length UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_packed_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Write a compressed position vector.
    pub fn write_vector2(&mut self, value: Vector2) {
        let (x, y) = value.compress();
        self.write_u16(x);
        self.write_u16(y);
    }

    /// Open a nested message; the length is patched by `end_message`.
    pub fn start_message(&mut self, tag: u8) {
        self.open.push(self.buf.len());
        self.buf.extend_from_slice(&[0, 0, tag]);
    }

    /// Close the innermost open message.
    pub fn end_message(&mut self) -> Result<(), CodecError> {
        let start = self.open.pop().ok_or(CodecError::NoOpenMessage)?;
        let body_len = self.buf.len() - start - MESSAGE_HEADER_LEN;
        let len = u16::try_from(body_len).map_err(|_| CodecError::MessageTooLarge(body_len))?;
        self.buf[start..start + 2].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_int_encoding() {
        let mut writer = MessageWriter::new();
        writer.write_packed_u32(300);
        assert_eq!(writer.as_bytes(), &[0xAC, 0x02]);

        let mut reader = MessageReader::new(writer.as_bytes());
        assert_eq!(reader.read_packed_u32().unwrap(), 300);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_negative_packed_i32_uses_five_bytes() {
        let mut writer = MessageWriter::new();
        writer.write_packed_i32(-4);
        assert_eq!(writer.len(), 5);

        let mut reader = MessageReader::new(writer.as_bytes());
        assert_eq!(reader.read_packed_i32().unwrap(), -4);
    }

    #[test]
    fn test_packed_int_overflow_rejected() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut reader = MessageReader::new(&bytes);
        assert_eq!(reader.read_packed_u32(), Err(CodecError::PackedIntOverflow));
    }

    #[test]
    fn test_truncated_read_is_an_error() {
        let bytes = [0x01];
        let mut reader = MessageReader::new(&bytes);
        assert!(matches!(
            reader.read_u32(),
            Err(CodecError::UnexpectedEof { needed: 4, remaining: 1 })
        ));
    }

    #[test]
    fn test_nested_message_keeps_raw_span() {
        let mut writer = MessageWriter::new();
        writer.start_message(7);
        writer.write_packed_i32(12);
        writer.end_message().unwrap();
        writer.write_u8(0xEE);

        let bytes = writer.into_bytes();
        let mut reader = MessageReader::new(&bytes);
        let msg = reader.read_message().unwrap();

        assert_eq!(msg.reader.tag(), 7);
        assert_eq!(msg.raw, &bytes[..4]);
        assert_eq!(msg.reader.body(), &[12]);
        assert_eq!(reader.read_u8().unwrap(), 0xEE);
    }

    #[test]
    fn test_message_length_past_end_is_rejected() {
        // Declares 10 body bytes, provides 1
        let bytes = [10, 0, 1, 0xAA];
        let mut reader = MessageReader::new(&bytes);
        assert!(reader.read_message().is_err());
    }

    #[test]
    fn test_end_without_start() {
        let mut writer = MessageWriter::new();
        assert_eq!(writer.end_message(), Err(CodecError::NoOpenMessage));
    }

    #[test]
    fn test_string_with_invalid_utf8() {
        let bytes = [2, 0xC3, 0x28];
        let mut reader = MessageReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(CodecError::InvalidUtf8));
    }
}
