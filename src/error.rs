use thiserror::Error;

use crate::tags::Feature;

/// Failure while reading a serialized stream. Carries the byte offset in
/// the input at which the offending tag or payload starts.
#[derive(Debug, Error)]
#[error("decode error at input byte {offset}: {kind}")]
pub struct DecodeError {
  pub offset: usize,
  pub kind: DecodeErrorKind,
}

impl DecodeError {
  pub(crate) fn new(offset: usize, kind: DecodeErrorKind) -> DecodeError {
    DecodeError { offset, kind }
  }
}

#[derive(Debug, Error)]
pub enum DecodeErrorKind {
  #[error("missing 0xFF version header")]
  MissingHeader,
  #[error("unsupported wire format version {0}")]
  UnsupportedVersion(u32),
  #[error("unhandled tag byte {byte:#04x} at version {version}")]
  UnhandledTag { byte: u8, version: u32 },
  #[error("input ended early: needed {needed} more bytes, {available} left")]
  ShortBuffer { needed: usize, available: usize },
  #[error("malformed varint")]
  MalformedVarint,
  #[error("{entity} trailer declared {declared} but {actual} were present")]
  CountMismatch {
    entity: &'static str,
    declared: u32,
    actual: u32,
  },
  #[error("reference to object id {id} before its slot was reserved")]
  IllegalCyclicReference { id: u32 },
  #[error("feature {feature} is disabled (requires version {required_version})")]
  FeatureNotEnabled {
    feature: Feature,
    required_version: u32,
  },
  #[error(
    "view range {byte_offset}+{byte_length} exceeds buffer of {buffer_byte_length} bytes"
  )]
  BufferViewOutOfBounds {
    byte_offset: u32,
    byte_length: u32,
    buffer_byte_length: u32,
  },
  #[error("view byte {quantity} {value} is not a multiple of the {element_width}-byte element width")]
  UnalignedBufferView {
    quantity: &'static str,
    value: u32,
    element_width: u32,
  },
  #[error("length-tracking view over a non-resizable buffer")]
  InvalidFlagCombination,
  #[error("odd byte length {0} for a two-byte string")]
  OddLengthTwoByteString(u32),
  #[error("unhandled view sub-tag {0:#04x}")]
  UnhandledViewTag(u8),
  #[error("unhandled error field tag {0:#04x}")]
  UnhandledErrorField(u8),
  #[error("invalid regexp flag bits {0:#x}")]
  InvalidRegExpFlags(u32),
  #[error("property key is not an index or a string")]
  InvalidPropertyKey,
  #[error(
    "resizable buffer byte length {byte_length} exceeds max byte length {max_byte_length}"
  )]
  InvalidMaxByteLength {
    byte_length: u32,
    max_byte_length: u32,
  },
  #[error("host object with no handler installed")]
  HostObjectUnsupported,
  #[error("value nesting exceeds the recursion depth limit")]
  TooDeeplyNested,
  #[error("unconsumed bytes after the top-level value")]
  TrailingData,
  #[error("object id {0} was reserved but never filled")]
  UnfilledPlaceholder(u32),
}

/// Failure while producing a serialized stream. Carries the length of the
/// output produced so far, i.e. the offset the next byte would have had.
/// Callers discard the partial buffer; nothing is committed on error.
#[derive(Debug, Error)]
#[error("encode error at output byte {offset}: {kind}")]
pub struct EncodeError {
  pub offset: usize,
  pub kind: EncodeErrorKind,
}

impl EncodeError {
  pub(crate) fn new(offset: usize, kind: EncodeErrorKind) -> EncodeError {
    EncodeError { offset, kind }
  }
}

#[derive(Debug, Error)]
pub enum EncodeErrorKind {
  #[error("unsupported declared wire format version {0}")]
  UnsupportedVersion(u32),
  #[error("feature {feature} is disabled (requires version {required_version})")]
  FeatureNotEnabled {
    feature: Feature,
    required_version: u32,
  },
  #[error("no encode step for the value and no host handler claimed it")]
  UnhandledValue,
  #[error("string of {0} bytes does not fit the wire format")]
  StringTooLong(usize),
  #[error("bigint magnitude of {0} bytes does not fit the wire format")]
  BigIntTooLarge(usize),
  #[error("buffer of {0} bytes does not fit the wire format")]
  BufferTooLarge(usize),
  #[error("{entity} count does not fit the wire format")]
  CountOverflow { entity: &'static str },
  #[error("object id does not belong to the value graph being encoded")]
  ForeignObjectId,
  #[error("value nesting exceeds the recursion depth limit")]
  TooDeeplyNested,
}
