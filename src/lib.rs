//! A bidirectional codec for the V8 value-serialization format, the wire
//! representation behind `v8.serialize` in Node.js and structured clone in
//! Deno. Decoding turns bytes into a [`Value`] plus a [`ValueGraph`]
//! holding every identity-eligible object; encoding is the mirror. Shared
//! and cyclic structure round-trips through wire reference ids.
//!
//! [`TagReader`] and [`TagWriter`] expose the token level for custom
//! compositions; [`decode`] and [`encode`] are the whole-value entry
//! points.

mod de;
mod error;
mod host;
mod ser;
mod stream;
mod tags;
mod value;
mod wire;

pub use crate::de::DecodeOptions;
pub use crate::de::ValueDecoder;
pub use crate::error::DecodeError;
pub use crate::error::DecodeErrorKind;
pub use crate::error::EncodeError;
pub use crate::error::EncodeErrorKind;
pub use crate::host::HostObject;
pub use crate::host::HostObjectHandler;
pub use crate::ser::EncodeOptions;
pub use crate::ser::ValueEncoder;
pub use crate::stream::ErrorItem;
pub use crate::stream::RawBigInt;
pub use crate::stream::RawString;
pub use crate::stream::TagReader;
pub use crate::stream::TagWriter;
pub use crate::stream::Token;
pub use crate::tags::ErrorField;
pub use crate::tags::Feature;
pub use crate::tags::Features;
pub use crate::tags::ViewTag;
pub use crate::tags::WireTag;
pub use crate::tags::LATEST_VERSION;
pub use crate::tags::MINIMUM_VERSION;
pub use crate::value::same_value_zero;
pub use crate::value::value_eq;
pub use crate::value::ArrayBuffer;
pub use crate::value::ArrayBufferTransfer;
pub use crate::value::BoxedPrimitive;
pub use crate::value::BufferView;
pub use crate::value::Date;
pub use crate::value::DenseArray;
pub use crate::value::ErrorName;
pub use crate::value::GraphBuilder;
pub use crate::value::JsError;
pub use crate::value::JsMap;
pub use crate::value::JsSet;
pub use crate::value::JsString;
pub use crate::value::Latin1String;
pub use crate::value::ObjectId;
pub use crate::value::ObjectValue;
pub use crate::value::PropertyKey;
pub use crate::value::PropertyMap;
pub use crate::value::RegExp;
pub use crate::value::RegExpFlags;
pub use crate::value::SharedArrayBuffer;
pub use crate::value::SparseArray;
pub use crate::value::Utf16String;
pub use crate::value::Utf8String;
pub use crate::value::Value;
pub use crate::value::ValueGraph;
pub use crate::value::ViewFlags;
pub use crate::value::ViewKind;
pub use crate::wire::varint_width;
pub use crate::wire::Mark;
pub use crate::wire::WireReader;
pub use crate::wire::WireWriter;

/// Serializes a value at the latest version with every feature enabled.
pub fn encode(graph: &ValueGraph, value: &Value) -> Result<Vec<u8>, EncodeError> {
  ValueEncoder::default().encode(graph, value)
}

/// Deserializes a value with every feature enabled.
pub fn decode(bytes: &[u8]) -> Result<(Value, ValueGraph), DecodeError> {
  ValueDecoder::default().decode(bytes)
}
