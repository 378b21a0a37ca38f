use crate::error::DecodeError;
use crate::error::DecodeErrorKind;
use crate::tags::WireTag;

/// A position bookmark produced by [`WireReader::mark`] and consumed by
/// [`WireReader::rewind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
  position: usize,
}

/// Bounded cursor over a borrowed byte slice. All reads fail with a
/// positional [`DecodeError`] instead of panicking; nothing is copied out
/// of the slice except by the caller.
#[derive(Debug)]
pub struct WireReader<'a> {
  bytes: &'a [u8],
  position: usize,
}

impl<'a> WireReader<'a> {
  pub fn new(bytes: &'a [u8]) -> WireReader<'a> {
    WireReader { bytes, position: 0 }
  }

  pub fn position(&self) -> usize {
    self.position
  }

  pub fn remaining(&self) -> usize {
    self.bytes.len() - self.position
  }

  pub fn is_at_end(&self) -> bool {
    self.position >= self.bytes.len()
  }

  pub fn mark(&self) -> Mark {
    Mark {
      position: self.position,
    }
  }

  /// Moves the cursor back to a previously taken [`Mark`].
  pub fn rewind(&mut self, mark: Mark) {
    debug_assert!(mark.position <= self.bytes.len());
    self.position = mark.position;
  }

  /// Creates a DecodeError at the current cursor position.
  pub(crate) fn err(&self, kind: DecodeErrorKind) -> DecodeError {
    DecodeError::new(self.position, kind)
  }

  /// Creates a DecodeError at an explicit position, for errors that should
  /// point at the start of the item that failed rather than at the cursor.
  pub(crate) fn err_at(
    &self,
    position: usize,
    kind: DecodeErrorKind,
  ) -> DecodeError {
    DecodeError::new(position, kind)
  }

  fn short(&self, needed: usize) -> DecodeError {
    self.err(DecodeErrorKind::ShortBuffer {
      needed,
      available: self.remaining(),
    })
  }

  /// Fails unless at least `bytes` more bytes are available. Used before
  /// length-driven allocations so a corrupt length cannot balloon memory.
  pub fn ensure_available(&self, bytes: usize) -> Result<(), DecodeError> {
    if self.remaining() < bytes {
      return Err(self.short(bytes));
    }
    Ok(())
  }

  pub fn peek_u8(&self) -> Option<u8> {
    self.bytes.get(self.position).copied()
  }

  pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
    let byte = self.peek_u8().ok_or_else(|| self.short(1))?;
    self.position += 1;
    Ok(byte)
  }

  pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
    let end = self
      .position
      .checked_add(len)
      .filter(|end| *end <= self.bytes.len())
      .ok_or_else(|| self.short(len))?;
    let slice = &self.bytes[self.position..end];
    self.position = end;
    Ok(slice)
  }

  fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
    let mut out = [0u8; N];
    out.copy_from_slice(self.read_bytes(N)?);
    Ok(out)
  }

  pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
    Ok(u32::from_le_bytes(self.read_array::<4>()?))
  }

  pub fn read_f64_le(&mut self) -> Result<f64, DecodeError> {
    Ok(f64::from_le_bytes(self.read_array::<8>()?))
  }

  /// Unsigned base-128 varint, least significant group first. At most five
  /// bytes may carry a continuation bit for a u32; anything longer is
  /// malformed.
  pub fn read_varint_u32(&mut self) -> Result<u32, DecodeError> {
    let start = self.position;
    let mut value = 0u32;
    for i in 0..5 {
      let byte = self.read_u8()?;
      value |= ((byte & 0x7f) as u32) << (i * 7);
      if byte & 0x80 == 0 {
        if i == 4 && byte > 0x0f {
          return Err(self.err_at(start, DecodeErrorKind::MalformedVarint));
        }
        return Ok(value);
      }
    }
    Err(self.err_at(start, DecodeErrorKind::MalformedVarint))
  }

  /// Varint restricted to a single byte of value, used for sub-tags.
  pub fn read_varint_u8(&mut self) -> Result<u8, DecodeError> {
    let start = self.position;
    let value = self.read_varint_u32()?;
    u8::try_from(value)
      .map_err(|_| self.err_at(start, DecodeErrorKind::MalformedVarint))
  }

  /// Signed integer mapped through ZigZag (0, -1, 1, -2, ... as 0, 1, 2,
  /// 3, ...).
  pub fn read_zigzag_i32(&mut self) -> Result<i32, DecodeError> {
    let unsigned = self.read_varint_u32()?;
    Ok((unsigned >> 1) as i32 ^ -((unsigned & 1) as i32))
  }

  /// Varint byte length followed by that many raw bytes.
  pub fn read_blob(&mut self) -> Result<&'a [u8], DecodeError> {
    let len = self.read_varint_u32()?;
    self.read_bytes(len as usize)
  }

  /// Latin-1 string body: a blob, one byte per code point.
  pub fn read_one_byte_body(&mut self) -> Result<&'a [u8], DecodeError> {
    self.read_blob()
  }

  /// UTF-16-LE string body. The byte length on the wire must be even.
  pub fn read_two_byte_body(&mut self) -> Result<&'a [u8], DecodeError> {
    let start = self.position;
    let len = self.read_varint_u32()?;
    if len % 2 != 0 {
      return Err(
        self.err_at(start, DecodeErrorKind::OddLengthTwoByteString(len)),
      );
    }
    self.read_bytes(len as usize)
  }

  /// UTF-8 string body: a blob.
  pub fn read_utf8_body(&mut self) -> Result<&'a [u8], DecodeError> {
    self.read_blob()
  }

  /// Advances past any padding bytes. Padding may appear wherever a tag is
  /// expected.
  pub fn skip_padding(&mut self) {
    while self.peek_u8() == Some(WireTag::Padding as u8) {
      self.position += 1;
    }
  }
}

/// Growable little-endian byte sink, the mirror of [`WireReader`].
#[derive(Default)]
pub struct WireWriter {
  out: Vec<u8>,
}

impl WireWriter {
  pub fn new() -> WireWriter {
    WireWriter::default()
  }

  /// Offset the next written byte will land at.
  pub fn position(&self) -> usize {
    self.out.len()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.out
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.out
  }

  pub fn write_u8(&mut self, byte: u8) {
    self.out.push(byte);
  }

  pub fn write_bytes(&mut self, bytes: &[u8]) {
    self.out.extend_from_slice(bytes);
  }

  pub fn write_u32_le(&mut self, value: u32) {
    self.out.extend_from_slice(&value.to_le_bytes());
  }

  pub fn write_f64_le(&mut self, value: f64) {
    self.out.extend_from_slice(&value.to_le_bytes());
  }

  pub fn write_varint_u32(&mut self, value: u32) {
    let mut value = value;
    while value >= 0x80 {
      self.out.push((value & 0x7f) as u8 | 0x80);
      value >>= 7;
    }
    self.out.push(value as u8);
  }

  pub fn write_varint_u8(&mut self, value: u8) {
    self.write_varint_u32(value as u32);
  }

  pub fn write_zigzag_i32(&mut self, value: i32) {
    self.write_varint_u32((value << 1) as u32 ^ (value >> 31) as u32);
  }
}

/// Number of bytes `value` occupies as a varint. The writer uses this to
/// predict where a two-byte string body will start.
pub fn varint_width(value: u32) -> usize {
  let mut value = value;
  let mut width = 1;
  while value >= 0x80 {
    width += 1;
    value >>= 7;
  }
  width
}
