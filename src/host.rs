use std::any::Any;
use std::fmt::Debug;

use crate::error::DecodeError;
use crate::error::EncodeError;
use crate::stream::TagReader;
use crate::stream::TagWriter;

/// An opaque, embedder-defined value carried under the HostObject tag. The
/// codec never looks inside; the payload only round-trips through a
/// [`HostObjectHandler`].
pub struct HostObject {
  payload: Box<dyn Any>,
}

impl HostObject {
  pub fn new<T: Any>(payload: T) -> HostObject {
    HostObject {
      payload: Box::new(payload),
    }
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.payload.downcast_ref()
  }
}

impl Debug for HostObject {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "HostObject")
  }
}

/// Embedder hook for values the format itself cannot express. On encode
/// the handler is offered each [`HostObject`] and writes its payload with
/// the writer's raw primitives, returning false to decline; on decode it
/// is invoked for every HostObject tag and must consume exactly the bytes
/// its encode side wrote.
pub trait HostObjectHandler {
  fn encode(
    &mut self,
    object: &HostObject,
    writer: &mut TagWriter,
  ) -> Result<bool, EncodeError>;

  fn decode(
    &mut self,
    reader: &mut TagReader<'_>,
  ) -> Result<HostObject, DecodeError>;
}
