use std::collections::HashMap;

use crate::error::DecodeError;
use crate::error::DecodeErrorKind;
use crate::host::HostObjectHandler;
use crate::stream::ErrorItem;
use crate::stream::TagReader;
use crate::stream::Token;
use crate::tags::Feature;
use crate::tags::Features;
use crate::tags::WireTag;
use crate::value::ArrayBuffer;
use crate::value::ArrayBufferTransfer;
use crate::value::BoxedPrimitive;
use crate::value::BufferView;
use crate::value::Date;
use crate::value::DenseArray;
use crate::value::ErrorName;
use crate::value::GraphBuilder;
use crate::value::JsError;
use crate::value::JsMap;
use crate::value::JsSet;
use crate::value::ObjectValue;
use crate::value::PropertyKey;
use crate::value::PropertyMap;
use crate::value::RegExp;
use crate::value::SharedArrayBuffer;
use crate::value::SparseArray;
use crate::value::Value;
use crate::value::ValueGraph;
use crate::value::ViewFlags;
use crate::value::ViewKind;

const RECURSION_DEPTH_LIMIT: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
  pub features: Features,
}

/// Reconstructs a value graph from serialized bytes. Single use: one
/// decoder per top-level call. The reference table is built as objects are
/// first encountered; placeholders are reserved before recursing into a
/// composite so back-references into structure still under construction
/// resolve.
pub struct ValueDecoder<'h> {
  features: Features,
  transfer_buffers: HashMap<u32, ArrayBuffer>,
  host: Option<&'h mut dyn HostObjectHandler>,
  depth: usize,
}

impl Default for ValueDecoder<'_> {
  fn default() -> Self {
    ValueDecoder::new(DecodeOptions::default())
  }
}

impl<'h> ValueDecoder<'h> {
  pub fn new(options: DecodeOptions) -> ValueDecoder<'h> {
    ValueDecoder {
      features: options.features,
      transfer_buffers: HashMap::new(),
      host: None,
      depth: 0,
    }
  }

  pub fn with_host_handler(
    mut self,
    handler: &'h mut dyn HostObjectHandler,
  ) -> ValueDecoder<'h> {
    self.host = Some(handler);
    self
  }

  /// Registers the buffer a transfer id resolves to. Each registration is
  /// consumed by the first transfer tag carrying its id.
  pub fn transfer_array_buffer(
    &mut self,
    transfer_id: u32,
    buffer: ArrayBuffer,
  ) {
    self.transfer_buffers.insert(transfer_id, buffer);
  }

  pub fn decode(
    mut self,
    bytes: &[u8],
  ) -> Result<(Value, ValueGraph), DecodeError> {
    let mut reader = TagReader::new(bytes, self.features)?;
    let mut graph = GraphBuilder::new();
    let value = self.read_value(&mut reader, &mut graph)?;
    if !reader.is_at_end() {
      return Err(DecodeError::new(
        reader.position(),
        DecodeErrorKind::TrailingData,
      ));
    }
    let graph = graph.finish().map_err(|index| {
      DecodeError::new(
        reader.position(),
        DecodeErrorKind::UnfilledPlaceholder(index),
      )
    })?;
    Ok((value, graph))
  }

  fn read_value(
    &mut self,
    reader: &mut TagReader<'_>,
    graph: &mut GraphBuilder,
  ) -> Result<Value, DecodeError> {
    if self.depth > RECURSION_DEPTH_LIMIT {
      return Err(DecodeError::new(
        reader.position(),
        DecodeErrorKind::TooDeeplyNested,
      ));
    }
    self.depth += 1;
    let result = self.read_value_inner(reader, graph);
    self.depth -= 1;
    let value = result?;

    // A view tag may trail any value that resolved to a buffer, including
    // a back-reference to one; the view then takes the next id itself.
    if let Value::Object(id) = value {
      let backing = match graph.peek(id) {
        Some(ObjectValue::ArrayBuffer(buffer)) => Some(Backing {
          byte_length: Some(buffer.byte_length()),
          resizable: buffer.is_resizable(),
        }),
        Some(ObjectValue::SharedArrayBuffer(_))
        | Some(ObjectValue::ArrayBufferTransfer(_)) => Some(Backing {
          byte_length: None,
          resizable: false,
        }),
        _ => None,
      };
      if let Some(backing) = backing {
        if reader.peek_tag() == Some(WireTag::ArrayBufferView) {
          let view = match reader.next_token()? {
            Token::View {
              kind,
              byte_offset,
              byte_length,
              flags,
            } => {
              build_view(reader, id, backing, kind, byte_offset, byte_length, flags)?
            }
            _ => return Err(reader.err_unexpected()),
          };
          return Ok(Value::Object(graph.insert(ObjectValue::View(view))));
        }
      }
    }

    Ok(value)
  }

  fn read_value_inner(
    &mut self,
    reader: &mut TagReader<'_>,
    graph: &mut GraphBuilder,
  ) -> Result<Value, DecodeError> {
    match reader.next_token()? {
      Token::Undefined => Ok(Value::Undefined),
      Token::Null => Ok(Value::Null),
      Token::True => Ok(Value::Bool(true)),
      Token::False => Ok(Value::Bool(false)),
      Token::Int32(value) => Ok(Value::Int32(value)),
      Token::Uint32(value) => Ok(Value::Uint32(value)),
      Token::Double(value) => Ok(Value::Double(value)),
      Token::BigInt(raw) => Ok(Value::BigInt(raw.to_bigint())),
      Token::String(raw) => Ok(Value::String(raw.to_js_string())),
      Token::ObjectReference(wire_id) => graph
        .by_wire_id(wire_id)
        .map(Value::Object)
        .ok_or_else(|| {
          reader
            .err_here(DecodeErrorKind::IllegalCyclicReference { id: wire_id })
        }),
      Token::BeginObject => {
        let id = graph.reserve();
        let (properties, pairs, closer) =
          self.read_properties(reader, graph, WireTag::EndObject)?;
        let Token::EndObject { property_count } = closer else {
          return Err(reader.err_unexpected());
        };
        check_count(reader, "object property", property_count, pairs)?;
        graph.fill(id, ObjectValue::Object(properties));
        Ok(Value::Object(id))
      }
      Token::BeginSparseArray { length } => {
        let id = graph.reserve();
        let (properties, pairs, closer) =
          self.read_properties(reader, graph, WireTag::EndSparseArray)?;
        let Token::EndSparseArray {
          property_count,
          length: trailer_length,
        } = closer
        else {
          return Err(reader.err_unexpected());
        };
        check_count(reader, "sparse array property", property_count, pairs)?;
        check_count(reader, "sparse array length", trailer_length, length)?;
        graph.fill(id, ObjectValue::SparseArray(SparseArray { length, properties }));
        Ok(Value::Object(id))
      }
      Token::BeginDenseArray { length } => {
        let id = graph.reserve();
        // Each element takes at least one byte; a corrupt length cannot
        // reserve more memory than input.
        reader.ensure_available(length as usize)?;
        let mut elements = Vec::with_capacity(length as usize);
        for _ in 0..length {
          if reader.peek_tag() == Some(WireTag::TheHole) {
            let _ = reader.next_token()?;
            elements.push(None);
          } else {
            elements.push(Some(self.read_value(reader, graph)?));
          }
        }
        let (properties, pairs, closer) =
          self.read_properties(reader, graph, WireTag::EndDenseArray)?;
        let Token::EndDenseArray {
          property_count,
          length: trailer_length,
        } = closer
        else {
          return Err(reader.err_unexpected());
        };
        check_count(reader, "dense array property", property_count, pairs)?;
        check_count(reader, "dense array length", trailer_length, length)?;
        graph.fill(
          id,
          ObjectValue::DenseArray(DenseArray {
            elements,
            properties,
          }),
        );
        Ok(Value::Object(id))
      }
      Token::BeginMap => {
        let id = graph.reserve();
        let mut entries = JsMap::new();
        let mut items_read = 0u32;
        let declared = loop {
          if reader.peek_tag() == Some(WireTag::EndMap) {
            let Token::EndMap { item_count } = reader.next_token()? else {
              return Err(reader.err_unexpected());
            };
            break item_count;
          }
          let key = self.read_value(reader, graph)?;
          let value = self.read_value(reader, graph)?;
          entries.insert(key, value);
          items_read = items_read.saturating_add(2);
        };
        check_count(reader, "map item", declared, items_read)?;
        graph.fill(id, ObjectValue::Map(entries));
        Ok(Value::Object(id))
      }
      Token::BeginSet => {
        let id = graph.reserve();
        let mut values = JsSet::new();
        let mut items_read = 0u32;
        let declared = loop {
          if reader.peek_tag() == Some(WireTag::EndSet) {
            let Token::EndSet { item_count } = reader.next_token()? else {
              return Err(reader.err_unexpected());
            };
            break item_count;
          }
          values.insert(self.read_value(reader, graph)?);
          items_read = items_read.saturating_add(1);
        };
        check_count(reader, "set element", declared, items_read)?;
        graph.fill(id, ObjectValue::Set(values));
        Ok(Value::Object(id))
      }
      Token::Date(millis) => Ok(Value::Object(
        graph.insert(ObjectValue::Date(Date::from_epoch_millis(millis))),
      )),
      Token::BooleanObject(value) => Ok(Value::Object(
        graph.insert(ObjectValue::Boxed(BoxedPrimitive::Bool(value))),
      )),
      Token::NumberObject(value) => Ok(Value::Object(
        graph.insert(ObjectValue::Boxed(BoxedPrimitive::Number(value))),
      )),
      Token::BigIntObject(raw) => Ok(Value::Object(graph.insert(
        ObjectValue::Boxed(BoxedPrimitive::BigInt(raw.to_bigint())),
      ))),
      Token::StringObject(raw) => Ok(Value::Object(graph.insert(
        ObjectValue::Boxed(BoxedPrimitive::String(raw.to_js_string())),
      ))),
      Token::RegExp { source, flags } => {
        Ok(Value::Object(graph.insert(ObjectValue::RegExp(RegExp {
          source: source.to_js_string(),
          flags,
        }))))
      }
      Token::ArrayBuffer {
        data,
        max_byte_length,
      } => Ok(Value::Object(graph.insert(ObjectValue::ArrayBuffer(
        ArrayBuffer::with_max_byte_length(data.to_vec(), max_byte_length),
      )))),
      Token::ArrayBufferTransfer { transfer_id } => {
        let object = match self.transfer_buffers.remove(&transfer_id) {
          Some(buffer) => ObjectValue::ArrayBuffer(buffer),
          None => {
            ObjectValue::ArrayBufferTransfer(ArrayBufferTransfer { transfer_id })
          }
        };
        Ok(Value::Object(graph.insert(object)))
      }
      Token::SharedArrayBuffer { transfer_id } => {
        Ok(Value::Object(graph.insert(ObjectValue::SharedArrayBuffer(
          SharedArrayBuffer { transfer_id },
        ))))
      }
      Token::HostObject => {
        let id = graph.reserve();
        let Some(handler) = self.host.as_mut() else {
          return Err(reader.err_here(DecodeErrorKind::HostObjectUnsupported));
        };
        let object = handler.decode(reader)?;
        graph.fill(id, ObjectValue::Host(object));
        Ok(Value::Object(id))
      }
      Token::BeginError => {
        let id = graph.reserve();
        let mut name = ErrorName::Error;
        let mut message = None;
        let mut stack = None;
        let mut cause = None;
        loop {
          match reader.next_error_item()? {
            ErrorItem::Name(value) => name = value,
            ErrorItem::Message(raw) => message = Some(raw.to_js_string()),
            ErrorItem::Stack(raw) => stack = Some(raw.to_js_string()),
            ErrorItem::Cause => {
              let value = self.read_value(reader, graph)?;
              if let Value::Object(cause_id) = value {
                if cause_id == id
                  && !self.features.has(Feature::CircularErrorCause)
                {
                  return Err(reader.err_here(
                    DecodeErrorKind::FeatureNotEnabled {
                      feature: Feature::CircularErrorCause,
                      required_version: Feature::CircularErrorCause
                        .required_version(),
                    },
                  ));
                }
              }
              cause = Some(value);
            }
            ErrorItem::End => break,
          }
        }
        graph.fill(
          id,
          ObjectValue::Error(JsError {
            name,
            message,
            stack,
            cause,
          }),
        );
        Ok(Value::Object(id))
      }
      // Well-formed tokens that are not legal in value position: holes
      // outside a dense array, closers without an opener, views without a
      // preceding buffer.
      Token::TheHole
      | Token::EndObject { .. }
      | Token::EndSparseArray { .. }
      | Token::EndDenseArray { .. }
      | Token::EndMap { .. }
      | Token::EndSet { .. }
      | Token::View { .. } => Err(reader.err_unexpected()),
    }
  }

  /// Key/value pairs until the given closer. Returns the assembled map,
  /// the number of pairs actually read (duplicate keys collapse in the map
  /// but still count), and the closer token.
  fn read_properties<'a>(
    &mut self,
    reader: &mut TagReader<'a>,
    graph: &mut GraphBuilder,
    end: WireTag,
  ) -> Result<(PropertyMap, u32, Token<'a>), DecodeError> {
    let mut properties = PropertyMap::new();
    let mut pairs = 0u32;
    loop {
      if reader.peek_tag() == Some(end) {
        let closer = reader.next_token()?;
        return Ok((properties, pairs, closer));
      }
      let key = self.read_property_key(reader)?;
      let value = self.read_value(reader, graph)?;
      properties.insert(key, value);
      pairs = pairs.saturating_add(1);
    }
  }

  fn read_property_key(
    &mut self,
    reader: &mut TagReader<'_>,
  ) -> Result<PropertyKey, DecodeError> {
    match reader.next_token()? {
      Token::Int32(value) => {
        if value >= 0 {
          Ok(PropertyKey::Index(value as u32))
        } else {
          Ok(PropertyKey::from_str(&value.to_string()))
        }
      }
      Token::Uint32(value) => Ok(PropertyKey::Index(value)),
      Token::Double(value) => Ok(PropertyKey::from_double(value)),
      Token::String(raw) => {
        Ok(PropertyKey::from_js_string(raw.to_js_string()))
      }
      _ => Err(reader.err_here(DecodeErrorKind::InvalidPropertyKey)),
    }
  }
}

fn check_count(
  reader: &TagReader<'_>,
  entity: &'static str,
  declared: u32,
  actual: u32,
) -> Result<(), DecodeError> {
  if declared != actual {
    return Err(reader.err_here(DecodeErrorKind::CountMismatch {
      entity,
      declared,
      actual,
    }));
  }
  Ok(())
}

struct Backing {
  /// None when the bytes live out of band (shared or unresolved transfer)
  /// and bounds cannot be checked here.
  byte_length: Option<u32>,
  resizable: bool,
}

fn build_view(
  reader: &TagReader<'_>,
  buffer: crate::value::ObjectId,
  backing: Backing,
  kind: ViewKind,
  byte_offset: u32,
  byte_length: u32,
  flags: ViewFlags,
) -> Result<BufferView, DecodeError> {
  let element_width = kind.element_width();
  if byte_offset % element_width != 0 {
    return Err(reader.err_here(DecodeErrorKind::UnalignedBufferView {
      quantity: "offset",
      value: byte_offset,
      element_width,
    }));
  }
  if byte_length % element_width != 0 {
    return Err(reader.err_here(DecodeErrorKind::UnalignedBufferView {
      quantity: "length",
      value: byte_length,
      element_width,
    }));
  }
  if flags.contains(ViewFlags::LENGTH_TRACKING)
    && !backing.resizable
    && backing.byte_length.is_some()
  {
    return Err(reader.err_here(DecodeErrorKind::InvalidFlagCombination));
  }
  if let Some(buffer_byte_length) = backing.byte_length {
    if byte_offset > buffer_byte_length
      || byte_length > buffer_byte_length - byte_offset
    {
      return Err(reader.err_here(DecodeErrorKind::BufferViewOutOfBounds {
        byte_offset,
        byte_length,
        buffer_byte_length,
      }));
    }
  }
  Ok(BufferView {
    kind,
    buffer,
    byte_offset,
    byte_length,
    flags,
  })
}
