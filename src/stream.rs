use num_bigint::BigInt;
use num_bigint::Sign;

use crate::error::DecodeError;
use crate::error::DecodeErrorKind;
use crate::error::EncodeError;
use crate::error::EncodeErrorKind;
use crate::tags::ErrorField;
use crate::tags::Feature;
use crate::tags::Features;
use crate::tags::ViewTag;
use crate::tags::WireTag;
use crate::tags::LATEST_VERSION;
use crate::tags::MINIMUM_VERSION;
use crate::tags::VERSION_RESIZABLE;
use crate::tags::VERSION_VIEW_FLAGS;
use crate::value::ErrorName;
use crate::value::JsString;
use crate::value::Latin1String;
use crate::value::RegExpFlags;
use crate::value::Utf16String;
use crate::value::Utf8String;
use crate::value::ViewFlags;
use crate::value::ViewKind;
use crate::wire::varint_width;
use crate::wire::Mark;
use crate::wire::WireReader;
use crate::wire::WireWriter;

/// One wire token: a tag byte together with its inline payload. String and
/// byte payloads borrow from the input.
#[derive(Debug, Clone)]
pub enum Token<'a> {
  Undefined,
  Null,
  True,
  False,
  /// Only legal as a dense array element.
  TheHole,
  Int32(i32),
  Uint32(u32),
  Double(f64),
  BigInt(RawBigInt<'a>),
  String(RawString<'a>),
  ObjectReference(u32),
  BeginObject,
  EndObject {
    property_count: u32,
  },
  BeginSparseArray {
    length: u32,
  },
  EndSparseArray {
    property_count: u32,
    length: u32,
  },
  BeginDenseArray {
    length: u32,
  },
  EndDenseArray {
    property_count: u32,
    length: u32,
  },
  BeginMap,
  EndMap {
    /// Keys plus values, i.e. twice the entry count.
    item_count: u32,
  },
  BeginSet,
  EndSet {
    item_count: u32,
  },
  Date(f64),
  BooleanObject(bool),
  NumberObject(f64),
  BigIntObject(RawBigInt<'a>),
  StringObject(RawString<'a>),
  RegExp {
    source: RawString<'a>,
    flags: RegExpFlags,
  },
  ArrayBuffer {
    data: &'a [u8],
    max_byte_length: Option<u32>,
  },
  ArrayBufferTransfer {
    transfer_id: u32,
  },
  SharedArrayBuffer {
    transfer_id: u32,
  },
  /// Always follows its backing buffer (or a reference to one).
  View {
    kind: ViewKind,
    byte_offset: u32,
    byte_length: u32,
    flags: ViewFlags,
  },
  /// Followed by [`ErrorItem`]s until [`ErrorItem::End`].
  BeginError,
  /// The payload that follows belongs to the host object handler.
  HostObject,
}

/// An undecoded BigInt payload: sign plus little-endian magnitude.
#[derive(Debug, Clone, Copy)]
pub struct RawBigInt<'a> {
  pub negative: bool,
  pub magnitude: &'a [u8],
}

impl RawBigInt<'_> {
  pub fn to_bigint(&self) -> BigInt {
    let sign = if self.negative { Sign::Minus } else { Sign::Plus };
    BigInt::from_bytes_le(sign, self.magnitude)
  }
}

/// An undecoded string body in its wire form.
#[derive(Debug, Clone, Copy)]
pub enum RawString<'a> {
  OneByte(&'a [u8]),
  /// UTF-16-LE bytes, guaranteed even in length.
  TwoByte(&'a [u8]),
  Utf8(&'a [u8]),
}

impl RawString<'_> {
  pub fn to_js_string(&self) -> JsString {
    match self {
      RawString::OneByte(bytes) => {
        JsString::OneByte(Latin1String::new(bytes.to_vec()))
      }
      RawString::TwoByte(bytes) => {
        let units = bytes
          .chunks_exact(2)
          .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
          .collect();
        JsString::TwoByte(Utf16String::new(units))
      }
      RawString::Utf8(bytes) => JsString::Utf8(Utf8String::new(bytes.to_vec())),
    }
  }
}

/// One item of an Error body.
#[derive(Debug, Clone)]
pub enum ErrorItem<'a> {
  Name(ErrorName),
  Message(RawString<'a>),
  Stack(RawString<'a>),
  /// The cause value follows as a full value.
  Cause,
  End,
}

/// Pull-style reader over a serialized stream. The header is validated
/// once on construction; [`TagReader::next_token`] then yields one token
/// per call, skipping padding and rejecting tags that are illegal for the
/// negotiated version or the enabled feature set.
#[derive(Debug)]
pub struct TagReader<'a> {
  wire: WireReader<'a>,
  version: u32,
  features: Features,
  last_tag_offset: usize,
  last_tag_byte: u8,
}

impl<'a> TagReader<'a> {
  pub fn new(
    bytes: &'a [u8],
    features: Features,
  ) -> Result<TagReader<'a>, DecodeError> {
    let mut wire = WireReader::new(bytes);
    wire.skip_padding();
    let header_offset = wire.position();
    let header = wire
      .read_u8()
      .map_err(|_| DecodeError::new(header_offset, DecodeErrorKind::MissingHeader))?;
    if header != WireTag::Version as u8 {
      return Err(DecodeError::new(
        header_offset,
        DecodeErrorKind::MissingHeader,
      ));
    }
    let version = wire.read_varint_u32()?;
    if !(MINIMUM_VERSION..=LATEST_VERSION).contains(&version) {
      return Err(DecodeError::new(
        header_offset,
        DecodeErrorKind::UnsupportedVersion(version),
      ));
    }
    Ok(TagReader {
      wire,
      version,
      features,
      last_tag_offset: header_offset,
      last_tag_byte: header,
    })
  }

  pub fn version(&self) -> u32 {
    self.version
  }

  pub fn features(&self) -> Features {
    self.features
  }

  pub fn position(&self) -> usize {
    self.wire.position()
  }

  pub fn mark(&self) -> Mark {
    self.wire.mark()
  }

  pub fn rewind(&mut self, mark: Mark) {
    self.wire.rewind(mark);
  }

  /// True once only padding (or nothing) remains.
  pub fn is_at_end(&mut self) -> bool {
    self.wire.skip_padding();
    self.wire.is_at_end()
  }

  /// The next tag byte, without consuming it. Returns None at end of input
  /// or for a byte that is not a known tag.
  pub fn peek_tag(&mut self) -> Option<WireTag> {
    self.wire.skip_padding();
    self.wire.peek_u8().and_then(WireTag::from_byte)
  }

  /// A DecodeError pointing at the most recently read tag.
  pub(crate) fn err_here(&self, kind: DecodeErrorKind) -> DecodeError {
    DecodeError::new(self.last_tag_offset, kind)
  }

  /// An `UnhandledTag` error pointing at the most recently read tag. Used
  /// by consumers that find a well-formed token in a position where it is
  /// not legal (a closer as a value, a hole outside a dense array).
  pub fn err_unexpected(&self) -> DecodeError {
    DecodeError::new(
      self.last_tag_offset,
      DecodeErrorKind::UnhandledTag {
        byte: self.last_tag_byte,
        version: self.version,
      },
    )
  }

  pub fn next_token(&mut self) -> Result<Token<'a>, DecodeError> {
    loop {
      self.wire.skip_padding();
      self.last_tag_offset = self.wire.position();
      let byte = self.wire.read_u8()?;
      self.last_tag_byte = byte;
      let Some(tag) = WireTag::from_byte(byte) else {
        return Err(self.err_unexpected());
      };
      if self.version < tag.minimum_version() {
        return Err(self.err_unexpected());
      }
      let token = match tag {
        // Only valid as the stream header, which new() consumed.
        WireTag::Version | WireTag::Padding => {
          return Err(self.err_unexpected())
        }
        WireTag::VerifyObjectCount => {
          // Legacy count, carried for sanity checks only.
          let _ = self.wire.read_varint_u32()?;
          continue;
        }
        WireTag::TheHole => Token::TheHole,
        WireTag::Undefined => Token::Undefined,
        WireTag::Null => Token::Null,
        WireTag::True => Token::True,
        WireTag::False => Token::False,
        WireTag::Int32 => Token::Int32(self.wire.read_zigzag_i32()?),
        WireTag::Uint32 => Token::Uint32(self.wire.read_varint_u32()?),
        WireTag::Double => Token::Double(self.wire.read_f64_le()?),
        WireTag::BigInt => Token::BigInt(self.read_bigint_body()?),
        WireTag::OneByteString => {
          Token::String(RawString::OneByte(self.wire.read_one_byte_body()?))
        }
        WireTag::TwoByteString => {
          Token::String(RawString::TwoByte(self.wire.read_two_byte_body()?))
        }
        WireTag::Utf8String => {
          Token::String(RawString::Utf8(self.wire.read_utf8_body()?))
        }
        WireTag::ObjectReference => {
          Token::ObjectReference(self.wire.read_varint_u32()?)
        }
        WireTag::BeginObject => Token::BeginObject,
        WireTag::EndObject => Token::EndObject {
          property_count: self.wire.read_varint_u32()?,
        },
        WireTag::BeginSparseArray => Token::BeginSparseArray {
          length: self.wire.read_varint_u32()?,
        },
        WireTag::EndSparseArray => {
          let property_count = self.wire.read_varint_u32()?;
          let length = self.wire.read_varint_u32()?;
          Token::EndSparseArray {
            property_count,
            length,
          }
        }
        WireTag::BeginDenseArray => Token::BeginDenseArray {
          length: self.wire.read_varint_u32()?,
        },
        WireTag::EndDenseArray => {
          let property_count = self.wire.read_varint_u32()?;
          let length = self.wire.read_varint_u32()?;
          Token::EndDenseArray {
            property_count,
            length,
          }
        }
        WireTag::BeginMap => Token::BeginMap,
        WireTag::EndMap => Token::EndMap {
          item_count: self.wire.read_varint_u32()?,
        },
        WireTag::BeginSet => Token::BeginSet,
        WireTag::EndSet => Token::EndSet {
          item_count: self.wire.read_varint_u32()?,
        },
        WireTag::Date => Token::Date(self.wire.read_f64_le()?),
        WireTag::BooleanObjectTrue => Token::BooleanObject(true),
        WireTag::BooleanObjectFalse => Token::BooleanObject(false),
        WireTag::NumberObject => Token::NumberObject(self.wire.read_f64_le()?),
        WireTag::BigIntObject => {
          Token::BigIntObject(self.read_bigint_body()?)
        }
        WireTag::StringObject => {
          Token::StringObject(self.next_string_token()?)
        }
        WireTag::RegExp => {
          let source = self.next_string_token()?;
          let flags = self.read_regexp_flags()?;
          Token::RegExp { source, flags }
        }
        WireTag::ArrayBuffer => {
          let data = self.wire.read_blob()?;
          Token::ArrayBuffer {
            data,
            max_byte_length: None,
          }
        }
        WireTag::ResizableArrayBuffer => {
          self.require(Feature::ResizableArrayBuffers)?;
          self.read_resizable_buffer()?
        }
        WireTag::ArrayBufferTransfer => Token::ArrayBufferTransfer {
          transfer_id: self.wire.read_varint_u32()?,
        },
        WireTag::SharedArrayBuffer => Token::SharedArrayBuffer {
          transfer_id: self.wire.read_varint_u32()?,
        },
        WireTag::ArrayBufferView => self.read_view_body()?,
        WireTag::HostObject => Token::HostObject,
        WireTag::Error => Token::BeginError,
      };
      return Ok(token);
    }
  }

  /// Reads a full string token where the grammar demands a string (regexp
  /// sources, boxed strings, error messages and stacks).
  pub fn next_string_token(&mut self) -> Result<RawString<'a>, DecodeError> {
    loop {
      self.wire.skip_padding();
      self.last_tag_offset = self.wire.position();
      let byte = self.wire.read_u8()?;
      self.last_tag_byte = byte;
      match WireTag::from_byte(byte) {
        Some(WireTag::VerifyObjectCount) => {
          let _ = self.wire.read_varint_u32()?;
          continue;
        }
        Some(WireTag::OneByteString) => {
          return Ok(RawString::OneByte(self.wire.read_one_byte_body()?))
        }
        Some(WireTag::TwoByteString) => {
          return Ok(RawString::TwoByte(self.wire.read_two_byte_body()?))
        }
        Some(WireTag::Utf8String) => {
          return Ok(RawString::Utf8(self.wire.read_utf8_body()?))
        }
        _ => return Err(self.err_unexpected()),
      }
    }
  }

  /// Reads one item of an Error body.
  pub fn next_error_item(&mut self) -> Result<ErrorItem<'a>, DecodeError> {
    let offset = self.wire.position();
    let byte = self.wire.read_varint_u8()?;
    let Some(field) = ErrorField::from_byte(byte) else {
      return Err(self.wire.err_at(
        offset,
        DecodeErrorKind::UnhandledErrorField(byte),
      ));
    };
    Ok(match field {
      ErrorField::EvalErrorPrototype => ErrorItem::Name(ErrorName::EvalError),
      ErrorField::RangeErrorPrototype => {
        ErrorItem::Name(ErrorName::RangeError)
      }
      ErrorField::ReferenceErrorPrototype => {
        ErrorItem::Name(ErrorName::ReferenceError)
      }
      ErrorField::SyntaxErrorPrototype => {
        ErrorItem::Name(ErrorName::SyntaxError)
      }
      ErrorField::TypeErrorPrototype => ErrorItem::Name(ErrorName::TypeError),
      ErrorField::UriErrorPrototype => ErrorItem::Name(ErrorName::UriError),
      ErrorField::Message => ErrorItem::Message(self.next_string_token()?),
      ErrorField::Stack => ErrorItem::Stack(self.next_string_token()?),
      ErrorField::Cause => ErrorItem::Cause,
      ErrorField::End => ErrorItem::End,
    })
  }

  fn require(&self, feature: Feature) -> Result<(), DecodeError> {
    if !self.features.has(feature) {
      return Err(DecodeError::new(
        self.last_tag_offset,
        DecodeErrorKind::FeatureNotEnabled {
          feature,
          required_version: feature.required_version(),
        },
      ));
    }
    Ok(())
  }

  fn read_bigint_body(&mut self) -> Result<RawBigInt<'a>, DecodeError> {
    // Bit 0 is the sign, the next 30 bits the byte length; the top bit is
    // reserved.
    let bitfield = self.wire.read_varint_u32()?;
    let negative = bitfield & 1 != 0;
    let byte_length = (bitfield & 0x7fff_fffe) >> 1;
    let magnitude = self.wire.read_bytes(byte_length as usize)?;
    Ok(RawBigInt {
      negative,
      magnitude,
    })
  }

  fn read_regexp_flags(&mut self) -> Result<RegExpFlags, DecodeError> {
    let offset = self.wire.position();
    let bits = self.wire.read_varint_u32()?;
    let invalid =
      |offset| self.wire.err_at(offset, DecodeErrorKind::InvalidRegExpFlags(bits));
    let Some(flags) = RegExpFlags::from_bits(bits) else {
      return Err(invalid(offset));
    };
    // V8 never serializes the linear flag, and u and v are exclusive.
    if flags.contains(RegExpFlags::LINEAR) {
      return Err(invalid(offset));
    }
    if flags.contains(RegExpFlags::UNICODE)
      && flags.contains(RegExpFlags::UNICODE_SETS)
    {
      return Err(invalid(offset));
    }
    if flags.contains(RegExpFlags::UNICODE_SETS) {
      if self.version < VERSION_RESIZABLE {
        return Err(invalid(offset));
      }
      self.require(Feature::RegExpUnicodeSets)?;
    }
    Ok(flags)
  }

  fn read_resizable_buffer(&mut self) -> Result<Token<'a>, DecodeError> {
    let byte_length = self.wire.read_varint_u32()?;
    let lengths_offset = self.wire.position();
    let max_byte_length = self.wire.read_varint_u32()?;
    if max_byte_length < byte_length {
      return Err(self.wire.err_at(
        lengths_offset,
        DecodeErrorKind::InvalidMaxByteLength {
          byte_length,
          max_byte_length,
        },
      ));
    }
    let data = self.wire.read_bytes(byte_length as usize)?;
    Ok(Token::ArrayBuffer {
      data,
      max_byte_length: Some(max_byte_length),
    })
  }

  fn read_view_body(&mut self) -> Result<Token<'a>, DecodeError> {
    let subtag_offset = self.wire.position();
    let subtag = self.wire.read_varint_u8()?;
    let Some(view_tag) = ViewTag::from_byte(subtag) else {
      return Err(
        self
          .wire
          .err_at(subtag_offset, DecodeErrorKind::UnhandledViewTag(subtag)),
      );
    };
    let kind = ViewKind::from_tag(view_tag);
    if kind == ViewKind::Float16 {
      self.require(Feature::Float16Array)?;
    }
    let byte_offset = self.wire.read_varint_u32()?;
    let byte_length = self.wire.read_varint_u32()?;
    let flags = if self.version >= VERSION_VIEW_FLAGS {
      ViewFlags::from_bits_truncate(self.wire.read_varint_u32()?)
    } else {
      ViewFlags::empty()
    };
    if !flags.is_empty() {
      self.require(Feature::ResizableArrayBuffers)?;
    }
    Ok(Token::View {
      kind,
      byte_offset,
      byte_length,
      flags,
    })
  }

  // Raw primitives, for host object payloads and custom compositions.

  pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
    self.wire.read_u8()
  }

  pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
    self.wire.read_bytes(len)
  }

  pub fn read_varint_u32(&mut self) -> Result<u32, DecodeError> {
    self.wire.read_varint_u32()
  }

  pub fn read_zigzag_i32(&mut self) -> Result<i32, DecodeError> {
    self.wire.read_zigzag_i32()
  }

  pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
    self.wire.read_u32_le()
  }

  pub fn read_f64_le(&mut self) -> Result<f64, DecodeError> {
    self.wire.read_f64_le()
  }

  pub fn read_blob(&mut self) -> Result<&'a [u8], DecodeError> {
    self.wire.read_blob()
  }

  pub(crate) fn ensure_available(&self, bytes: usize) -> Result<(), DecodeError> {
    self.wire.ensure_available(bytes)
  }
}

/// Push-style writer, the mirror of [`TagReader`]. The header goes out on
/// construction; every emit method enforces the same version and feature
/// legality the reader checks.
pub struct TagWriter {
  wire: WireWriter,
  version: u32,
  features: Features,
}

impl TagWriter {
  pub fn new(
    version: u32,
    features: Features,
  ) -> Result<TagWriter, EncodeError> {
    if !(MINIMUM_VERSION..=LATEST_VERSION).contains(&version) {
      return Err(EncodeError::new(
        0,
        EncodeErrorKind::UnsupportedVersion(version),
      ));
    }
    let mut wire = WireWriter::new();
    wire.write_u8(WireTag::Version as u8);
    wire.write_varint_u32(version);
    Ok(TagWriter {
      wire,
      version,
      features,
    })
  }

  pub fn version(&self) -> u32 {
    self.version
  }

  pub fn features(&self) -> Features {
    self.features
  }

  /// Offset the next byte will be written at.
  pub fn position(&self) -> usize {
    self.wire.position()
  }

  pub fn as_bytes(&self) -> &[u8] {
    self.wire.as_bytes()
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.wire.into_bytes()
  }

  fn tag(&mut self, tag: WireTag) {
    self.wire.write_u8(tag as u8);
  }

  fn err(&self, kind: EncodeErrorKind) -> EncodeError {
    EncodeError::new(self.wire.position(), kind)
  }

  fn require(&self, feature: Feature) -> Result<(), EncodeError> {
    let required_version = feature.required_version();
    if !self.features.has(feature) || self.version < required_version {
      return Err(self.err(EncodeErrorKind::FeatureNotEnabled {
        feature,
        required_version,
      }));
    }
    Ok(())
  }

  pub fn undefined(&mut self) {
    self.tag(WireTag::Undefined);
  }

  pub fn null(&mut self) {
    self.tag(WireTag::Null);
  }

  pub fn bool(&mut self, value: bool) {
    self.tag(if value { WireTag::True } else { WireTag::False });
  }

  /// Only legal between the elements of a dense array.
  pub fn the_hole(&mut self) {
    self.tag(WireTag::TheHole);
  }

  pub fn int32(&mut self, value: i32) {
    self.tag(WireTag::Int32);
    self.wire.write_zigzag_i32(value);
  }

  pub fn uint32(&mut self, value: u32) {
    self.tag(WireTag::Uint32);
    self.wire.write_varint_u32(value);
  }

  pub fn double(&mut self, value: f64) {
    self.tag(WireTag::Double);
    self.wire.write_f64_le(value);
  }

  pub fn bigint(&mut self, value: &BigInt) -> Result<(), EncodeError> {
    self.tag(WireTag::BigInt);
    self.bigint_body(value)
  }

  fn bigint_body(&mut self, value: &BigInt) -> Result<(), EncodeError> {
    let (sign, magnitude) = value.to_bytes_le();
    if magnitude.len() > 0x3fff_ffff {
      return Err(self.err(EncodeErrorKind::BigIntTooLarge(magnitude.len())));
    }
    let mut bitfield = (magnitude.len() as u32) << 1;
    if sign == Sign::Minus {
      bitfield |= 1;
    }
    self.wire.write_varint_u32(bitfield);
    self.wire.write_bytes(&magnitude);
    Ok(())
  }

  pub fn string(&mut self, value: &JsString) -> Result<(), EncodeError> {
    match value {
      JsString::OneByte(s) => {
        let length = self.string_length(s.as_bytes().len())?;
        self.tag(WireTag::OneByteString);
        self.wire.write_varint_u32(length);
        self.wire.write_bytes(s.as_bytes());
      }
      JsString::Utf8(s) => {
        let length = self.string_length(s.as_bytes().len())?;
        self.tag(WireTag::Utf8String);
        self.wire.write_varint_u32(length);
        self.wire.write_bytes(s.as_bytes());
      }
      JsString::TwoByte(s) => {
        let bytes = s.to_le_bytes();
        let length = self.string_length(bytes.len())?;
        // Pad so the UTF-16 body lands on an even offset.
        if (self.wire.position() + 1 + varint_width(length)) % 2 == 1 {
          self.tag(WireTag::Padding);
        }
        self.tag(WireTag::TwoByteString);
        self.wire.write_varint_u32(length);
        self.wire.write_bytes(&bytes);
      }
    }
    Ok(())
  }

  fn string_length(&self, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| self.err(EncodeErrorKind::StringTooLong(len)))
  }

  pub fn object_reference(&mut self, id: u32) {
    self.tag(WireTag::ObjectReference);
    self.wire.write_varint_u32(id);
  }

  pub fn begin_object(&mut self) {
    self.tag(WireTag::BeginObject);
  }

  pub fn end_object(&mut self, property_count: u32) {
    self.tag(WireTag::EndObject);
    self.wire.write_varint_u32(property_count);
  }

  pub fn begin_sparse_array(&mut self, length: u32) {
    self.tag(WireTag::BeginSparseArray);
    self.wire.write_varint_u32(length);
  }

  pub fn end_sparse_array(&mut self, property_count: u32, length: u32) {
    self.tag(WireTag::EndSparseArray);
    self.wire.write_varint_u32(property_count);
    self.wire.write_varint_u32(length);
  }

  pub fn begin_dense_array(&mut self, length: u32) {
    self.tag(WireTag::BeginDenseArray);
    self.wire.write_varint_u32(length);
  }

  pub fn end_dense_array(&mut self, property_count: u32, length: u32) {
    self.tag(WireTag::EndDenseArray);
    self.wire.write_varint_u32(property_count);
    self.wire.write_varint_u32(length);
  }

  pub fn begin_map(&mut self) {
    self.tag(WireTag::BeginMap);
  }

  pub fn end_map(&mut self, entry_count: usize) -> Result<(), EncodeError> {
    let overflow = || self.err(EncodeErrorKind::CountOverflow { entity: "map" });
    let item_count = u32::try_from(entry_count)
      .ok()
      .and_then(|count| count.checked_mul(2))
      .ok_or_else(overflow)?;
    self.tag(WireTag::EndMap);
    self.wire.write_varint_u32(item_count);
    Ok(())
  }

  pub fn begin_set(&mut self) {
    self.tag(WireTag::BeginSet);
  }

  pub fn end_set(&mut self, element_count: usize) -> Result<(), EncodeError> {
    let count = u32::try_from(element_count)
      .map_err(|_| self.err(EncodeErrorKind::CountOverflow { entity: "set" }))?;
    self.tag(WireTag::EndSet);
    self.wire.write_varint_u32(count);
    Ok(())
  }

  pub fn date(&mut self, epoch_millis: f64) {
    self.tag(WireTag::Date);
    self.wire.write_f64_le(epoch_millis);
  }

  pub fn boolean_object(&mut self, value: bool) {
    self.tag(if value {
      WireTag::BooleanObjectTrue
    } else {
      WireTag::BooleanObjectFalse
    });
  }

  pub fn number_object(&mut self, value: f64) {
    self.tag(WireTag::NumberObject);
    self.wire.write_f64_le(value);
  }

  pub fn bigint_object(&mut self, value: &BigInt) -> Result<(), EncodeError> {
    self.tag(WireTag::BigIntObject);
    self.bigint_body(value)
  }

  pub fn string_object(&mut self, value: &JsString) -> Result<(), EncodeError> {
    self.tag(WireTag::StringObject);
    self.string(value)
  }

  pub fn regexp(
    &mut self,
    source: &JsString,
    flags: RegExpFlags,
  ) -> Result<(), EncodeError> {
    if flags.contains(RegExpFlags::UNICODE_SETS) {
      self.require(Feature::RegExpUnicodeSets)?;
    }
    self.tag(WireTag::RegExp);
    self.string(source)?;
    self.wire.write_varint_u32(flags.bits());
    Ok(())
  }

  pub fn array_buffer(
    &mut self,
    data: &[u8],
    max_byte_length: Option<u32>,
  ) -> Result<(), EncodeError> {
    let byte_length = u32::try_from(data.len())
      .map_err(|_| self.err(EncodeErrorKind::BufferTooLarge(data.len())))?;
    match max_byte_length {
      Some(max_byte_length) => {
        self.require(Feature::ResizableArrayBuffers)?;
        self.tag(WireTag::ResizableArrayBuffer);
        self.wire.write_varint_u32(byte_length);
        self.wire.write_varint_u32(max_byte_length.max(byte_length));
      }
      None => {
        self.tag(WireTag::ArrayBuffer);
        self.wire.write_varint_u32(byte_length);
      }
    }
    self.wire.write_bytes(data);
    Ok(())
  }

  pub fn array_buffer_transfer(&mut self, transfer_id: u32) {
    self.tag(WireTag::ArrayBufferTransfer);
    self.wire.write_varint_u32(transfer_id);
  }

  pub fn shared_array_buffer(&mut self, transfer_id: u32) {
    self.tag(WireTag::SharedArrayBuffer);
    self.wire.write_varint_u32(transfer_id);
  }

  /// The backing buffer (or a reference to it) must have been written
  /// directly before this call.
  pub fn array_buffer_view(
    &mut self,
    kind: ViewKind,
    byte_offset: u32,
    byte_length: u32,
    flags: ViewFlags,
  ) -> Result<(), EncodeError> {
    if kind == ViewKind::Float16 {
      self.require(Feature::Float16Array)?;
    }
    if !flags.is_empty() {
      self.require(Feature::ResizableArrayBuffers)?;
    }
    self.tag(WireTag::ArrayBufferView);
    self.wire.write_varint_u8(kind.tag() as u8);
    self.wire.write_varint_u32(byte_offset);
    self.wire.write_varint_u32(byte_length);
    if self.version >= VERSION_VIEW_FLAGS {
      self.wire.write_varint_u32(flags.bits());
    }
    Ok(())
  }

  pub fn begin_error(&mut self) {
    self.tag(WireTag::Error);
  }

  pub fn error_name(&mut self, name: ErrorName) {
    let field = match name {
      // The base prototype is the decoder default and has no field.
      ErrorName::Error => return,
      ErrorName::EvalError => ErrorField::EvalErrorPrototype,
      ErrorName::RangeError => ErrorField::RangeErrorPrototype,
      ErrorName::ReferenceError => ErrorField::ReferenceErrorPrototype,
      ErrorName::SyntaxError => ErrorField::SyntaxErrorPrototype,
      ErrorName::TypeError => ErrorField::TypeErrorPrototype,
      ErrorName::UriError => ErrorField::UriErrorPrototype,
    };
    self.wire.write_varint_u8(field as u8);
  }

  pub fn error_message(&mut self, message: &JsString) -> Result<(), EncodeError> {
    self.wire.write_varint_u8(ErrorField::Message as u8);
    self.string(message)
  }

  pub fn error_stack(&mut self, stack: &JsString) -> Result<(), EncodeError> {
    self.wire.write_varint_u8(ErrorField::Stack as u8);
    self.string(stack)
  }

  /// The cause value itself follows as a full value.
  pub fn error_cause(&mut self) {
    self.wire.write_varint_u8(ErrorField::Cause as u8);
  }

  pub fn end_error(&mut self) {
    self.wire.write_varint_u8(ErrorField::End as u8);
  }

  /// The handler's payload follows, written with the raw primitives.
  pub fn host_object(&mut self) {
    self.tag(WireTag::HostObject);
  }

  // Raw primitives, for host object payloads and custom compositions.

  pub fn write_u8(&mut self, byte: u8) {
    self.wire.write_u8(byte);
  }

  pub fn write_bytes(&mut self, bytes: &[u8]) {
    self.wire.write_bytes(bytes);
  }

  pub fn write_varint_u32(&mut self, value: u32) {
    self.wire.write_varint_u32(value);
  }

  pub fn write_zigzag_i32(&mut self, value: i32) {
    self.wire.write_zigzag_i32(value);
  }

  pub fn write_u32_le(&mut self, value: u32) {
    self.wire.write_u32_le(value);
  }

  pub fn write_f64_le(&mut self, value: f64) {
    self.wire.write_f64_le(value);
  }

  pub fn write_blob(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
    let length = u32::try_from(bytes.len())
      .map_err(|_| self.err(EncodeErrorKind::BufferTooLarge(bytes.len())))?;
    self.wire.write_varint_u32(length);
    self.wire.write_bytes(bytes);
    Ok(())
  }
}
