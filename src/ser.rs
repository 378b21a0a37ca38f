use std::collections::HashMap;

use crate::error::EncodeError;
use crate::error::EncodeErrorKind;
use crate::host::HostObjectHandler;
use crate::stream::TagWriter;
use crate::tags::Feature;
use crate::tags::Features;
use crate::tags::LATEST_VERSION;
use crate::value::BoxedPrimitive;
use crate::value::JsError;
use crate::value::ObjectId;
use crate::value::ObjectValue;
use crate::value::PropertyKey;
use crate::value::PropertyMap;
use crate::value::Value;
use crate::value::ValueGraph;

const RECURSION_DEPTH_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct EncodeOptions {
  /// Declared wire format version, 13 through 15. The output claims this
  /// version and uses only constructs legal in it.
  pub version: u32,
  pub features: Features,
}

impl Default for EncodeOptions {
  fn default() -> EncodeOptions {
    EncodeOptions {
      version: LATEST_VERSION,
      features: Features::default(),
    }
  }
}

/// Serializes one value graph. Single use: one encoder per top-level call.
/// Ids are handed out in first-visit depth-first order; a value seen again
/// becomes a back-reference, which is also what terminates cycles.
pub struct ValueEncoder<'h> {
  options: EncodeOptions,
  host: Option<&'h mut dyn HostObjectHandler>,
}

impl Default for ValueEncoder<'_> {
  fn default() -> Self {
    ValueEncoder::new(EncodeOptions::default())
  }
}

impl<'h> ValueEncoder<'h> {
  pub fn new(options: EncodeOptions) -> ValueEncoder<'h> {
    ValueEncoder {
      options,
      host: None,
    }
  }

  pub fn with_host_handler(
    mut self,
    handler: &'h mut dyn HostObjectHandler,
  ) -> ValueEncoder<'h> {
    self.host = Some(handler);
    self
  }

  pub fn encode(
    self,
    graph: &ValueGraph,
    value: &Value,
  ) -> Result<Vec<u8>, EncodeError> {
    let writer = TagWriter::new(self.options.version, self.options.features)?;
    let mut state = EncodeState {
      writer,
      ids: HashMap::new(),
      host: self.host,
      depth: 0,
    };
    state.write_value(graph, value)?;
    Ok(state.writer.into_bytes())
  }
}

struct EncodeState<'h> {
  writer: TagWriter,
  ids: HashMap<ObjectId, u32>,
  host: Option<&'h mut dyn HostObjectHandler>,
  depth: usize,
}

impl EncodeState<'_> {
  fn err(&self, kind: EncodeErrorKind) -> EncodeError {
    EncodeError::new(self.writer.position(), kind)
  }

  fn write_value(
    &mut self,
    graph: &ValueGraph,
    value: &Value,
  ) -> Result<(), EncodeError> {
    match value {
      Value::Undefined => self.writer.undefined(),
      Value::Null => self.writer.null(),
      Value::Bool(value) => self.writer.bool(*value),
      Value::Int32(value) => self.writer.int32(*value),
      Value::Uint32(value) => self.writer.uint32(*value),
      Value::Double(value) => self.writer.double(*value),
      Value::BigInt(value) => self.writer.bigint(value)?,
      Value::String(value) => self.writer.string(value)?,
      Value::Object(id) => {
        self.depth += 1;
        let result = self.write_object(graph, *id);
        self.depth -= 1;
        result?;
      }
    }
    Ok(())
  }

  fn write_object(
    &mut self,
    graph: &ValueGraph,
    id: ObjectId,
  ) -> Result<(), EncodeError> {
    if self.depth > RECURSION_DEPTH_LIMIT {
      return Err(self.err(EncodeErrorKind::TooDeeplyNested));
    }
    let Some(object) = graph.lookup(id) else {
      return Err(self.err(EncodeErrorKind::ForeignObjectId));
    };

    // A view's backing buffer is serialized directly before the view tag
    // and therefore takes the lower id.
    if let ObjectValue::View(view) = object {
      if !self.ids.contains_key(&id) {
        self.depth += 1;
        let result = self.write_object(graph, view.buffer);
        self.depth -= 1;
        result?;
      }
    }

    let next_id = self.ids.len() as u32;
    if let Some(&wire_id) = self.ids.get(&id) {
      self.writer.object_reference(wire_id);
      return Ok(());
    }
    self.ids.insert(id, next_id);

    match object {
      ObjectValue::Boxed(BoxedPrimitive::Bool(value)) => {
        self.writer.boolean_object(*value);
      }
      ObjectValue::Boxed(BoxedPrimitive::Number(value)) => {
        self.writer.number_object(*value);
      }
      ObjectValue::Boxed(BoxedPrimitive::BigInt(value)) => {
        self.writer.bigint_object(value)?;
      }
      ObjectValue::Boxed(BoxedPrimitive::String(value)) => {
        self.writer.string_object(value)?;
      }
      ObjectValue::Date(date) => self.writer.date(date.epoch_millis()),
      ObjectValue::RegExp(regexp) => {
        self.writer.regexp(&regexp.source, regexp.flags)?;
      }
      ObjectValue::Object(properties) => {
        self.writer.begin_object();
        let count = self.write_properties(graph, properties)?;
        self.writer.end_object(count);
      }
      ObjectValue::DenseArray(array) => {
        let length = u32::try_from(array.elements.len()).map_err(|_| {
          self.err(EncodeErrorKind::CountOverflow { entity: "array" })
        })?;
        self.writer.begin_dense_array(length);
        for element in &array.elements {
          match element {
            Some(value) => self.write_value(graph, value)?,
            None => self.writer.the_hole(),
          }
        }
        let count = self.write_properties(graph, &array.properties)?;
        self.writer.end_dense_array(count, length);
      }
      ObjectValue::SparseArray(array) => {
        self.writer.begin_sparse_array(array.length);
        let count = self.write_properties(graph, &array.properties)?;
        self.writer.end_sparse_array(count, array.length);
      }
      ObjectValue::Map(map) => {
        self.writer.begin_map();
        for (key, value) in map.iter() {
          self.write_value(graph, key)?;
          self.write_value(graph, value)?;
        }
        self.writer.end_map(map.len())?;
      }
      ObjectValue::Set(set) => {
        self.writer.begin_set();
        for value in set.iter() {
          self.write_value(graph, value)?;
        }
        self.writer.end_set(set.len())?;
      }
      ObjectValue::ArrayBuffer(buffer) => {
        self
          .writer
          .array_buffer(buffer.as_bytes(), buffer.max_byte_length())?;
      }
      ObjectValue::SharedArrayBuffer(buffer) => {
        self.writer.shared_array_buffer(buffer.transfer_id);
      }
      ObjectValue::ArrayBufferTransfer(transfer) => {
        self.writer.array_buffer_transfer(transfer.transfer_id);
      }
      ObjectValue::View(view) => {
        self.writer.array_buffer_view(
          view.kind,
          view.byte_offset,
          view.byte_length,
          view.flags,
        )?;
      }
      ObjectValue::Error(error) => self.write_error(graph, id, error)?,
      ObjectValue::Host(object) => {
        self.writer.host_object();
        let Some(handler) = self.host.as_mut() else {
          return Err(EncodeError::new(
            self.writer.position(),
            EncodeErrorKind::UnhandledValue,
          ));
        };
        if !handler.encode(object, &mut self.writer)? {
          return Err(self.err(EncodeErrorKind::UnhandledValue));
        }
      }
    }
    Ok(())
  }

  fn write_properties(
    &mut self,
    graph: &ValueGraph,
    properties: &PropertyMap,
  ) -> Result<u32, EncodeError> {
    let count = u32::try_from(properties.len()).map_err(|_| {
      self.err(EncodeErrorKind::CountOverflow { entity: "property" })
    })?;
    for (key, value) in properties.iter() {
      match key {
        PropertyKey::Index(index) => {
          // Small indexes go out as smis, the rest under the u32 tag.
          if *index <= i32::MAX as u32 {
            self.writer.int32(*index as i32);
          } else {
            self.writer.uint32(*index);
          }
        }
        PropertyKey::String(s) => self.writer.string(s)?,
      }
      self.write_value(graph, value)?;
    }
    Ok(count)
  }

  fn write_error(
    &mut self,
    graph: &ValueGraph,
    id: ObjectId,
    error: &JsError,
  ) -> Result<(), EncodeError> {
    if let Some(Value::Object(cause_id)) = &error.cause {
      if *cause_id == id
        && !self.writer.features().has(Feature::CircularErrorCause)
      {
        return Err(self.err(EncodeErrorKind::FeatureNotEnabled {
          feature: Feature::CircularErrorCause,
          required_version: Feature::CircularErrorCause.required_version(),
        }));
      }
    }
    self.writer.begin_error();
    self.writer.error_name(error.name);
    if let Some(message) = &error.message {
      self.writer.error_message(message)?;
    }
    if let Some(cause) = &error.cause {
      self.writer.error_cause();
      self.write_value(graph, cause)?;
    }
    if let Some(stack) = &error.stack {
      self.writer.error_stack(stack)?;
    }
    self.writer.end_error();
    Ok(())
  }
}
