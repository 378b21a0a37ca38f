use std::fmt::Display;

/// Newest wire format version this crate reads and writes.
pub const LATEST_VERSION: u32 = 15;
/// Oldest wire format version this crate accepts.
pub const MINIMUM_VERSION: u32 = 13;

/// First version that carries the per-view flags varint after the byte
/// length of an array buffer view.
pub const VERSION_VIEW_FLAGS: u32 = 14;
/// First version that may carry resizable array buffers and the `v`
/// regular expression flag.
pub const VERSION_RESIZABLE: u32 = 15;

/// Tag bytes of the V8 value-serialization format.
///
/// https://source.chromium.org/chromium/chromium/src/+/main:v8/src/objects/value-serializer.cc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireTag {
  // 0xFF, followed by varint(version). Only valid at the start of a stream.
  Version = 0xFF,
  // Skipped wherever a tag is expected. The writer uses it to align
  // two-byte string bodies.
  Padding = 0x00,
  // Legacy sanity check, varint payload. Read and ignored.
  VerifyObjectCount = b'?',
  // Marks an absent element inside a dense array.
  TheHole = b'-',
  Undefined = b'_',
  Null = b'0',
  True = b'T',
  False = b'F',
  // varint, ZigZag-encoded.
  Int32 = b'I',
  // varint.
  Uint32 = b'U',
  // 8-byte little-endian IEEE-754.
  Double = b'N',
  // varint bitfield (sign | byte_length << 1), then little-endian magnitude.
  BigInt = b'Z',
  // varint byte length, then (W)UTF-8 bytes.
  Utf8String = b'S',
  // varint byte length, then Latin-1 bytes.
  OneByteString = b'"',
  // varint byte length (even), then UTF-16-LE code units.
  TwoByteString = b'c',
  // varint id of a previously serialized object.
  ObjectReference = b'^',
  BeginObject = b'o',
  // Closer carries varint(property count).
  EndObject = b'{',
  // Opener carries varint(length).
  BeginSparseArray = b'a',
  // Closer carries varint(property count), varint(length).
  EndSparseArray = b'@',
  // Opener carries varint(length), then that many elements.
  BeginDenseArray = b'A',
  // Closer carries varint(property count), varint(length).
  EndDenseArray = b'$',
  // 8-byte little-endian double, milliseconds since the epoch.
  Date = b'D',
  BooleanObjectTrue = b'y',
  BooleanObjectFalse = b'x',
  // 8-byte little-endian double.
  NumberObject = b'n',
  // Same payload as BigInt.
  BigIntObject = b'z',
  // A full string tag follows.
  StringObject = b's',
  // Source string tag, then varint flag bits.
  RegExp = b'R',
  BeginMap = b';',
  // Closer carries varint(2 x entry count).
  EndMap = b':',
  BeginSet = b'\'',
  // Closer carries varint(element count).
  EndSet = b',',
  // varint byte length, then raw bytes.
  ArrayBuffer = b'B',
  // varint byte length, varint max byte length, then raw bytes.
  ResizableArrayBuffer = b'~',
  // varint transfer id, resolved against a caller-provided table.
  ArrayBufferTransfer = b't',
  // varint view sub-tag, varint byte offset, varint byte length, and from
  // version 14 a varint flags field. Must directly follow its backing
  // buffer (or an ObjectReference to one).
  ArrayBufferView = b'V',
  // varint transfer id. The memory itself travels out of band.
  SharedArrayBuffer = b'u',
  // Delegated to the host object handler.
  HostObject = b'\\',
  // Sequence of ErrorField items terminated by ErrorField::End.
  Error = b'r',
}

impl WireTag {
  pub fn from_byte(byte: u8) -> Option<WireTag> {
    Some(match byte {
      0xFF => WireTag::Version,
      0x00 => WireTag::Padding,
      b'?' => WireTag::VerifyObjectCount,
      b'-' => WireTag::TheHole,
      b'_' => WireTag::Undefined,
      b'0' => WireTag::Null,
      b'T' => WireTag::True,
      b'F' => WireTag::False,
      b'I' => WireTag::Int32,
      b'U' => WireTag::Uint32,
      b'N' => WireTag::Double,
      b'Z' => WireTag::BigInt,
      b'S' => WireTag::Utf8String,
      b'"' => WireTag::OneByteString,
      b'c' => WireTag::TwoByteString,
      b'^' => WireTag::ObjectReference,
      b'o' => WireTag::BeginObject,
      b'{' => WireTag::EndObject,
      b'a' => WireTag::BeginSparseArray,
      b'@' => WireTag::EndSparseArray,
      b'A' => WireTag::BeginDenseArray,
      b'$' => WireTag::EndDenseArray,
      b'D' => WireTag::Date,
      b'y' => WireTag::BooleanObjectTrue,
      b'x' => WireTag::BooleanObjectFalse,
      b'n' => WireTag::NumberObject,
      b'z' => WireTag::BigIntObject,
      b's' => WireTag::StringObject,
      b'R' => WireTag::RegExp,
      b';' => WireTag::BeginMap,
      b':' => WireTag::EndMap,
      b'\'' => WireTag::BeginSet,
      b',' => WireTag::EndSet,
      b'B' => WireTag::ArrayBuffer,
      b'~' => WireTag::ResizableArrayBuffer,
      b't' => WireTag::ArrayBufferTransfer,
      b'V' => WireTag::ArrayBufferView,
      b'u' => WireTag::SharedArrayBuffer,
      b'\\' => WireTag::HostObject,
      b'r' => WireTag::Error,
      _ => return None,
    })
  }

  /// Oldest wire format version in which this tag may appear.
  pub fn minimum_version(self) -> u32 {
    match self {
      WireTag::ResizableArrayBuffer => VERSION_RESIZABLE,
      _ => MINIMUM_VERSION,
    }
  }
}

/// Sub-tags of an ArrayBufferView, selecting the element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ViewTag {
  Int8Array = b'b',
  Uint8Array = b'B',
  Uint8ClampedArray = b'C',
  Int16Array = b'w',
  Uint16Array = b'W',
  Int32Array = b'd',
  Uint32Array = b'D',
  Float16Array = b'h',
  Float32Array = b'f',
  Float64Array = b'F',
  BigInt64Array = b'q',
  BigUint64Array = b'Q',
  DataView = b'?',
}

impl ViewTag {
  pub fn from_byte(byte: u8) -> Option<ViewTag> {
    Some(match byte {
      b'b' => ViewTag::Int8Array,
      b'B' => ViewTag::Uint8Array,
      b'C' => ViewTag::Uint8ClampedArray,
      b'w' => ViewTag::Int16Array,
      b'W' => ViewTag::Uint16Array,
      b'd' => ViewTag::Int32Array,
      b'D' => ViewTag::Uint32Array,
      b'h' => ViewTag::Float16Array,
      b'f' => ViewTag::Float32Array,
      b'F' => ViewTag::Float64Array,
      b'q' => ViewTag::BigInt64Array,
      b'Q' => ViewTag::BigUint64Array,
      b'?' => ViewTag::DataView,
      _ => return None,
    })
  }
}

/// Sub-tags inside an Error body. Each is written as a varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorField {
  EvalErrorPrototype = b'E',
  RangeErrorPrototype = b'R',
  ReferenceErrorPrototype = b'F',
  SyntaxErrorPrototype = b'S',
  TypeErrorPrototype = b'T',
  UriErrorPrototype = b'U',
  // Followed by a string.
  Message = b'm',
  // Followed by a full value.
  Cause = b'c',
  // Followed by a string.
  Stack = b's',
  End = b'.',
}

impl ErrorField {
  pub fn from_byte(byte: u8) -> Option<ErrorField> {
    Some(match byte {
      b'E' => ErrorField::EvalErrorPrototype,
      b'R' => ErrorField::RangeErrorPrototype,
      b'F' => ErrorField::ReferenceErrorPrototype,
      b'S' => ErrorField::SyntaxErrorPrototype,
      b'T' => ErrorField::TypeErrorPrototype,
      b'U' => ErrorField::UriErrorPrototype,
      b'm' => ErrorField::Message,
      b'c' => ErrorField::Cause,
      b's' => ErrorField::Stack,
      b'.' => ErrorField::End,
      _ => return None,
    })
  }
}

/// Gated codec behaviors. Each can be switched off to match an embedder
/// that runs V8 with the corresponding flag disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
  CircularErrorCause,
  RegExpUnicodeSets,
  ResizableArrayBuffers,
  Float16Array,
}

impl Feature {
  /// Wire format version the feature first appears in. Reported alongside
  /// `FeatureNotEnabled` errors.
  pub fn required_version(self) -> u32 {
    match self {
      Feature::CircularErrorCause => MINIMUM_VERSION,
      Feature::RegExpUnicodeSets => VERSION_RESIZABLE,
      Feature::ResizableArrayBuffers => VERSION_RESIZABLE,
      Feature::Float16Array => VERSION_RESIZABLE,
    }
  }
}

impl Display for Feature {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Feature::CircularErrorCause => write!(f, "CircularErrorCause"),
      Feature::RegExpUnicodeSets => write!(f, "RegExpUnicodeSets"),
      Feature::ResizableArrayBuffers => write!(f, "ResizableArrayBuffers"),
      Feature::Float16Array => write!(f, "Float16Array"),
    }
  }
}

bitflags::bitflags! {
  /// The set of enabled [`Feature`]s. Defaults to all of them.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  #[repr(transparent)]
  pub struct Features: u8 {
    const CIRCULAR_ERROR_CAUSE = 1 << 0;
    const REGEXP_UNICODE_SETS = 1 << 1;
    const RESIZABLE_ARRAY_BUFFERS = 1 << 2;
    const FLOAT16_ARRAY = 1 << 3;
  }
}

impl Features {
  pub fn has(self, feature: Feature) -> bool {
    match feature {
      Feature::CircularErrorCause => {
        self.contains(Features::CIRCULAR_ERROR_CAUSE)
      }
      Feature::RegExpUnicodeSets => {
        self.contains(Features::REGEXP_UNICODE_SETS)
      }
      Feature::ResizableArrayBuffers => {
        self.contains(Features::RESIZABLE_ARRAY_BUFFERS)
      }
      Feature::Float16Array => self.contains(Features::FLOAT16_ARRAY),
    }
  }
}

impl Default for Features {
  fn default() -> Features {
    Features::all()
  }
}
