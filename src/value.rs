use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;

use indexmap::IndexMap;
use indexmap::IndexSet;
use num_bigint::BigInt;
use rand::Rng;

use crate::host::HostObject;
use crate::tags::ViewTag;

/// A JavaScript string. The variant records which wire form the string was
/// read from (or will be written in); equality and hashing compare the
/// decoded UTF-16 code units, so the same text in different forms is equal.
#[derive(Clone)]
pub enum JsString {
  OneByte(Latin1String),
  TwoByte(Utf16String),
  Utf8(Utf8String),
}

impl JsString {
  /// Picks the wire form for freshly produced text: Latin-1 when every code
  /// point fits in one byte, UTF-16 otherwise. The UTF-8 form is accepted
  /// on decode but not preferred for new output.
  pub fn new(s: &str) -> JsString {
    if encoding_rs::mem::is_str_latin1(s) {
      let bytes = encoding_rs::mem::encode_latin1_lossy(s).into_owned();
      JsString::OneByte(Latin1String::new(bytes))
    } else {
      JsString::TwoByte(Utf16String::new(s.encode_utf16().collect()))
    }
  }

  /// The string's text. Ill-formed UTF-16 or UTF-8 converts lossily.
  pub fn to_cow(&self) -> Cow<'_, str> {
    match self {
      JsString::OneByte(s) => s.as_str(),
      JsString::TwoByte(s) => Cow::Owned(s.to_string_lossy()),
      JsString::Utf8(s) => s.as_str(),
    }
  }

  pub fn into_string(self) -> String {
    match self {
      JsString::OneByte(s) => s.into_string(),
      JsString::TwoByte(s) => s.to_string_lossy(),
      JsString::Utf8(s) => s.into_string(),
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      JsString::OneByte(s) => s.bytes.is_empty(),
      JsString::TwoByte(s) => s.units.is_empty(),
      JsString::Utf8(s) => s.bytes.is_empty(),
    }
  }

  /// The string as UTF-16 code units, the form JavaScript observes.
  pub fn to_utf16(&self) -> Vec<u16> {
    match self {
      JsString::OneByte(s) => {
        s.bytes.iter().map(|byte| *byte as u16).collect()
      }
      JsString::TwoByte(s) => s.units.clone(),
      JsString::Utf8(s) => s.as_str().encode_utf16().collect(),
    }
  }
}

impl PartialEq for JsString {
  fn eq(&self, other: &Self) -> bool {
    self.to_utf16() == other.to_utf16()
  }
}

impl Eq for JsString {}

impl Hash for JsString {
  fn hash<H: Hasher>(&self, state: &mut H) {
    for unit in self.to_utf16() {
      state.write_u16(unit);
    }
  }
}

impl Debug for JsString {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let form = match self {
      JsString::OneByte(_) => "OneByte",
      JsString::TwoByte(_) => "TwoByte",
      JsString::Utf8(_) => "Utf8",
    };
    write!(f, "{}(\"{}\")", form, self.to_cow().escape_default())
  }
}

impl From<&str> for JsString {
  fn from(s: &str) -> JsString {
    JsString::new(s)
  }
}

impl From<String> for JsString {
  fn from(s: String) -> JsString {
    JsString::new(&s)
  }
}

/// One-byte (Latin-1) string body: each byte is the code point U+0000 to
/// U+00FF.
#[derive(Debug, Clone)]
pub struct Latin1String {
  bytes: Vec<u8>,
  is_ascii: bool,
}

impl Latin1String {
  pub fn new(bytes: Vec<u8>) -> Latin1String {
    let is_ascii = bytes.is_ascii();
    Latin1String { bytes, is_ascii }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn as_str(&self) -> Cow<'_, str> {
    if self.is_ascii {
      // SAFETY: ASCII is valid UTF-8, and is_ascii was checked on
      // construction.
      Cow::Borrowed(unsafe { std::str::from_utf8_unchecked(&self.bytes) })
    } else {
      encoding_rs::mem::decode_latin1(&self.bytes)
    }
  }

  pub fn into_string(self) -> String {
    match self.as_str() {
      Cow::Borrowed(_) => {
        // SAFETY: borrowed means the bytes were ASCII, a UTF-8 subset.
        unsafe { String::from_utf8_unchecked(self.bytes) }
      }
      Cow::Owned(s) => s,
    }
  }
}

/// Two-byte string body: UTF-16 code units. Unpaired surrogates are kept
/// as-is and only degrade when the text is converted to UTF-8.
#[derive(Debug, Clone)]
pub struct Utf16String {
  units: Vec<u16>,
}

impl Utf16String {
  pub fn new(units: Vec<u16>) -> Utf16String {
    Utf16String { units }
  }

  pub fn units(&self) -> &[u16] {
    &self.units
  }

  pub fn to_string_lossy(&self) -> String {
    String::from_utf16_lossy(&self.units)
  }

  /// The body as it appears on the wire: little-endian bytes.
  pub fn to_le_bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(self.units.len() * 2);
    for unit in &self.units {
      bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
  }
}

/// UTF-8 string body as read off the wire. V8 may emit ill-formed data
/// here (lone surrogates encoded WTF-8 style); the raw bytes are preserved
/// and conversion degrades lossily.
#[derive(Debug, Clone)]
pub struct Utf8String {
  bytes: Vec<u8>,
  is_utf8: bool,
}

impl Utf8String {
  pub fn new(bytes: Vec<u8>) -> Utf8String {
    let is_utf8 = std::str::from_utf8(&bytes).is_ok();
    Utf8String { bytes, is_utf8 }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn as_str(&self) -> Cow<'_, str> {
    if self.is_utf8 {
      // SAFETY: validity was checked on construction.
      Cow::Borrowed(unsafe { std::str::from_utf8_unchecked(&self.bytes) })
    } else {
      String::from_utf8_lossy(&self.bytes)
    }
  }

  pub fn into_string(self) -> String {
    if self.is_utf8 {
      // SAFETY: validity was checked on construction.
      unsafe { String::from_utf8_unchecked(self.bytes) }
    } else {
      String::from_utf8_lossy(&self.bytes).into_owned()
    }
  }
}

/// A property name on an object or array. Integer-looking strings within
/// the 32-bit unsigned range canonicalize to `Index`, matching the engine
/// notion of an array index; everything else stays a string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
  Index(u32),
  String(JsString),
}

impl PropertyKey {
  pub fn from_str(s: &str) -> PropertyKey {
    match canonical_index(s) {
      Some(index) => PropertyKey::Index(index),
      None => PropertyKey::String(JsString::new(s)),
    }
  }

  pub fn from_js_string(s: JsString) -> PropertyKey {
    match canonical_index(&s.to_cow()) {
      Some(index) => PropertyKey::Index(index),
      None => PropertyKey::String(s),
    }
  }

  /// Keys V8 writes under a Double tag: integral in-range values become
  /// indexes, the rest become their decimal string form.
  pub fn from_double(value: f64) -> PropertyKey {
    if value.fract() == 0.0 && value >= 0.0 && value < u32::MAX as f64 + 1.0 {
      return PropertyKey::Index(value as u32);
    }
    let text = if value.is_nan() {
      "NaN".to_string()
    } else if value == f64::INFINITY {
      "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
      "-Infinity".to_string()
    } else {
      value.to_string()
    };
    PropertyKey::String(JsString::new(&text))
  }
}

/// The canonical decimal form: no sign, no leading zeros, fits in u32.
fn canonical_index(s: &str) -> Option<u32> {
  if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
    return None;
  }
  if !s.bytes().all(|byte| byte.is_ascii_digit()) {
    return None;
  }
  s.parse().ok()
}

impl Debug for PropertyKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      PropertyKey::Index(index) => Debug::fmt(index, f),
      PropertyKey::String(s) => Debug::fmt(s, f),
    }
  }
}

impl From<u32> for PropertyKey {
  fn from(index: u32) -> PropertyKey {
    PropertyKey::Index(index)
  }
}

impl From<&str> for PropertyKey {
  fn from(s: &str) -> PropertyKey {
    PropertyKey::from_str(s)
  }
}

/// A decoded or to-be-encoded JavaScript value. Primitives are held
/// inline; everything identity-eligible lives in a [`ValueGraph`] and is
/// referenced by [`ObjectId`], so shared and cyclic structure needs no
/// native back-pointers.
#[derive(Debug, Clone)]
pub enum Value {
  Undefined,
  Null,
  Bool(bool),
  Int32(i32),
  Uint32(u32),
  Double(f64),
  BigInt(BigInt),
  String(JsString),
  Object(ObjectId),
}

impl From<bool> for Value {
  fn from(value: bool) -> Value {
    Value::Bool(value)
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Value {
    Value::Int32(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Value {
    Value::Double(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Value {
    Value::String(JsString::new(value))
  }
}

impl From<ObjectId> for Value {
  fn from(id: ObjectId) -> Value {
    Value::Object(id)
  }
}

/// Handle to an object inside one specific [`ValueGraph`]. Ids carry a
/// random graph tag so a handle cannot be used against a foreign graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
  graph_id: u32,
  index: u32,
}

impl Debug for ObjectId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "*{}", self.index)
  }
}

/// The identity-eligible side of the value model: one slot per object, in
/// first-encounter order. Slot order is exactly the wire reference-id
/// order, both after a decode and during an encode.
pub struct ValueGraph {
  graph_id: u32,
  objects: Vec<ObjectValue>,
}

impl ValueGraph {
  pub fn new() -> ValueGraph {
    ValueGraph {
      graph_id: rand::thread_rng().gen(),
      objects: Vec::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }

  pub fn insert(&mut self, object: ObjectValue) -> ObjectId {
    let index = u32::try_from(self.objects.len())
      .expect("a value graph holds at most u32::MAX objects");
    self.objects.push(object);
    ObjectId {
      graph_id: self.graph_id,
      index,
    }
  }

  /// Panics if the id belongs to another graph.
  pub fn get(&self, id: ObjectId) -> &ObjectValue {
    self
      .lookup(id)
      .expect("object id used against a foreign value graph")
  }

  pub fn get_mut(&mut self, id: ObjectId) -> &mut ObjectValue {
    assert!(id.graph_id == self.graph_id);
    &mut self.objects[id.index as usize]
  }

  pub(crate) fn lookup(&self, id: ObjectId) -> Option<&ObjectValue> {
    if id.graph_id != self.graph_id {
      return None;
    }
    self.objects.get(id.index as usize)
  }

  pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectValue)> {
    let graph_id = self.graph_id;
    self.objects.iter().enumerate().map(move |(index, object)| {
      (
        ObjectId {
          graph_id,
          index: index as u32,
        },
        object,
      )
    })
  }
}

impl Default for ValueGraph {
  fn default() -> ValueGraph {
    ValueGraph::new()
  }
}

impl Debug for ValueGraph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "ValueGraph ")?;
    let mut map = f.debug_map();
    for (index, object) in self.objects.iter().enumerate() {
      map.entry(&index, object);
    }
    map.finish()
  }
}

/// Two-phase construction of a [`ValueGraph`]: a slot can be reserved
/// before the object that fills it exists, which is how cyclic structure
/// is built (and how the decoder installs placeholders before recursing).
pub struct GraphBuilder {
  graph_id: u32,
  slots: Vec<Option<ObjectValue>>,
}

impl Default for GraphBuilder {
  fn default() -> GraphBuilder {
    GraphBuilder {
      graph_id: rand::thread_rng().gen(),
      slots: Vec::new(),
    }
  }
}

impl GraphBuilder {
  pub fn new() -> GraphBuilder {
    GraphBuilder::default()
  }

  pub fn reserve(&mut self) -> ObjectId {
    let index = u32::try_from(self.slots.len())
      .expect("a value graph holds at most u32::MAX objects");
    self.slots.push(None);
    ObjectId {
      graph_id: self.graph_id,
      index,
    }
  }

  pub fn fill(&mut self, id: ObjectId, object: ObjectValue) {
    assert!(id.graph_id == self.graph_id);
    let slot = &mut self.slots[id.index as usize];
    assert!(
      slot.replace(object).is_none(),
      "slot {} has already been filled",
      id.index
    );
  }

  pub fn insert(&mut self, object: ObjectValue) -> ObjectId {
    let id = self.reserve();
    self.fill(id, object);
    id
  }

  pub fn peek(&self, id: ObjectId) -> Option<&ObjectValue> {
    assert!(id.graph_id == self.graph_id);
    self.slots[id.index as usize].as_ref()
  }

  /// Resolves a wire reference id. Ids number reserved slots in order, so
  /// anything below the current slot count is bound.
  pub(crate) fn by_wire_id(&self, wire_id: u32) -> Option<ObjectId> {
    if (wire_id as usize) < self.slots.len() {
      Some(ObjectId {
        graph_id: self.graph_id,
        index: wire_id,
      })
    } else {
      None
    }
  }

  /// Finishes the graph. Returns the index of the first unfilled slot if
  /// any reservation was never filled.
  pub fn finish(self) -> Result<ValueGraph, u32> {
    let mut objects = Vec::with_capacity(self.slots.len());
    for (index, slot) in self.slots.into_iter().enumerate() {
      objects.push(slot.ok_or(index as u32)?);
    }
    Ok(ValueGraph {
      graph_id: self.graph_id,
      objects,
    })
  }
}

/// An identity-eligible value: anything that gets a wire reference id and
/// is deduplicated on re-encounter.
#[derive(Debug)]
pub enum ObjectValue {
  Boxed(BoxedPrimitive),
  Date(Date),
  RegExp(RegExp),
  Object(PropertyMap),
  DenseArray(DenseArray),
  SparseArray(SparseArray),
  Map(JsMap),
  Set(JsSet),
  ArrayBuffer(ArrayBuffer),
  SharedArrayBuffer(SharedArrayBuffer),
  ArrayBufferTransfer(ArrayBufferTransfer),
  View(BufferView),
  Error(JsError),
  Host(HostObject),
}

/// A primitive wrapped in its object form (`new Boolean(..)`,
/// `new Number(..)`, `Object(1n)`, `new String(..)`).
#[derive(Debug, Clone)]
pub enum BoxedPrimitive {
  Bool(bool),
  Number(f64),
  BigInt(BigInt),
  String(JsString),
}

/// An instant on the UTC timeline with millisecond resolution. Stored the
/// way the engine stores it: a double that is a whole number or NaN and
/// never infinite; anything outside the representable range is NaN.
#[derive(Debug, Clone, Copy)]
pub struct Date {
  epoch_millis: f64,
}

const MAX_EPOCH_MILLIS: f64 = (864_000_000i64 * 10_000_000i64) as f64;

impl Date {
  pub fn from_epoch_millis(millis: f64) -> Date {
    if (-MAX_EPOCH_MILLIS..=MAX_EPOCH_MILLIS).contains(&millis) {
      Date {
        epoch_millis: truncate_toward_zero(millis),
      }
    } else {
      Date::invalid()
    }
  }

  /// The `new Date(NaN)` date.
  pub fn invalid() -> Date {
    Date {
      epoch_millis: f64::NAN,
    }
  }

  pub fn is_valid(&self) -> bool {
    !self.epoch_millis.is_nan()
  }

  /// The raw wire representation, NaN for invalid dates.
  pub fn epoch_millis(&self) -> f64 {
    self.epoch_millis
  }

  pub fn millis(&self) -> Option<i64> {
    if self.epoch_millis.is_nan() {
      return None;
    }
    Some(self.epoch_millis as i64)
  }
}

impl PartialEq for Date {
  fn eq(&self, other: &Self) -> bool {
    (self.epoch_millis.is_nan() && other.epoch_millis.is_nan())
      || self.epoch_millis == other.epoch_millis
  }
}

fn truncate_toward_zero(x: f64) -> f64 {
  if x.is_nan() || !x.is_finite() {
    return x;
  }
  // +0.0 normalizes a negative zero result.
  x.trunc() + 0.0
}

#[derive(Debug, PartialEq)]
pub struct RegExp {
  pub source: JsString,
  pub flags: RegExpFlags,
}

bitflags::bitflags! {
  /// Flag bits as they appear on the wire. `UNICODE_SETS` needs wire
  /// version 15 and the `RegExpUnicodeSets` feature.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  #[repr(transparent)]
  pub struct RegExpFlags: u32 {
    const GLOBAL = 1 << 0;
    const IGNORE_CASE = 1 << 1;
    const MULTILINE = 1 << 2;
    const STICKY = 1 << 3;
    const UNICODE = 1 << 4;
    const DOT_ALL = 1 << 5;
    const LINEAR = 1 << 6;
    const HAS_INDICES = 1 << 7;
    const UNICODE_SETS = 1 << 8;
  }
}

impl Display for RegExpFlags {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.contains(Self::HAS_INDICES) {
      write!(f, "d")?;
    }
    if self.contains(Self::GLOBAL) {
      write!(f, "g")?;
    }
    if self.contains(Self::IGNORE_CASE) {
      write!(f, "i")?;
    }
    if self.contains(Self::MULTILINE) {
      write!(f, "m")?;
    }
    if self.contains(Self::DOT_ALL) {
      write!(f, "s")?;
    }
    if self.contains(Self::UNICODE) {
      write!(f, "u")?;
    }
    if self.contains(Self::UNICODE_SETS) {
      write!(f, "v")?;
    }
    if self.contains(Self::STICKY) {
      write!(f, "y")?;
    }
    Ok(())
  }
}

/// String- and index-keyed properties in insertion order. Inserting an
/// existing key overwrites the value but keeps the key's original
/// position, which is what the engine observes.
#[derive(Debug, Default)]
pub struct PropertyMap {
  entries: IndexMap<PropertyKey, Value>,
}

impl PropertyMap {
  pub fn new() -> PropertyMap {
    PropertyMap::default()
  }

  pub fn insert(&mut self, key: PropertyKey, value: Value) -> Option<Value> {
    self.entries.insert(key, value)
  }

  pub fn get(&self, key: &PropertyKey) -> Option<&Value> {
    self.entries.get(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &Value)> {
    self.entries.iter()
  }
}

impl FromIterator<(PropertyKey, Value)> for PropertyMap {
  fn from_iter<I: IntoIterator<Item = (PropertyKey, Value)>>(
    iter: I,
  ) -> PropertyMap {
    PropertyMap {
      entries: iter.into_iter().collect(),
    }
  }
}

/// An array whose elements [0, length) are written out one by one. `None`
/// is a hole, which is observably different from `Some(Undefined)`. The
/// trailing `properties` hold any extra string-keyed slots on the array
/// object.
#[derive(Debug, Default)]
pub struct DenseArray {
  pub elements: Vec<Option<Value>>,
  pub properties: PropertyMap,
}

/// An array written as key/value pairs. `length` is authoritative and may
/// exceed the highest occupied index; indexes absent from `properties` are
/// holes.
#[derive(Debug, Default)]
pub struct SparseArray {
  pub length: u32,
  pub properties: PropertyMap,
}

impl SparseArray {
  pub fn element(&self, index: u32) -> Option<&Value> {
    self.properties.get(&PropertyKey::Index(index))
  }
}

/// Insertion-ordered map with SameValueZero keys: a duplicate key keeps
/// its first position and takes the last written value. Object keys
/// compare by identity, primitives by SameValueZero.
#[derive(Debug, Default)]
pub struct JsMap {
  entries: IndexMap<MapKey, Value>,
}

impl JsMap {
  pub fn new() -> JsMap {
    JsMap::default()
  }

  pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
    self.entries.insert(MapKey(key), value)
  }

  pub fn get(&self, key: &Value) -> Option<&Value> {
    self.entries.get(&MapKey(key.clone()))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
    self.entries.iter().map(|(key, value)| (&key.0, value))
  }
}

/// Insertion-ordered set of unique values under SameValueZero.
#[derive(Debug, Default)]
pub struct JsSet {
  values: IndexSet<MapKey>,
}

impl JsSet {
  pub fn new() -> JsSet {
    JsSet::default()
  }

  /// Returns false if an equal value was already present.
  pub fn insert(&mut self, value: Value) -> bool {
    self.values.insert(MapKey(value))
  }

  pub fn contains(&self, value: &Value) -> bool {
    self.values.contains(&MapKey(value.clone()))
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Value> {
    self.values.iter().map(|key| &key.0)
  }
}

/// Key wrapper giving [`Value`] the SameValueZero equivalence Map and Set
/// use: NaN equals NaN, +0 equals -0, numbers compare across their wire
/// forms, objects compare by identity.
#[derive(Debug, Clone)]
struct MapKey(Value);

impl PartialEq for MapKey {
  fn eq(&self, other: &Self) -> bool {
    same_value_zero(&self.0, &other.0)
  }
}

impl Eq for MapKey {}

impl Hash for MapKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    match &self.0 {
      Value::Undefined => state.write_u8(0),
      Value::Null => state.write_u8(1),
      Value::Bool(b) => {
        state.write_u8(2);
        b.hash(state);
      }
      Value::Int32(n) => {
        state.write_u8(3);
        state.write_u64(canonical_number_bits(*n as f64));
      }
      Value::Uint32(n) => {
        state.write_u8(3);
        state.write_u64(canonical_number_bits(*n as f64));
      }
      Value::Double(n) => {
        state.write_u8(3);
        state.write_u64(canonical_number_bits(*n));
      }
      Value::BigInt(n) => {
        state.write_u8(4);
        n.hash(state);
      }
      Value::String(s) => {
        state.write_u8(5);
        s.hash(state);
      }
      Value::Object(id) => {
        state.write_u8(6);
        id.hash(state);
      }
    }
  }
}

/// Normalizes a number so every NaN and both zeros hash and compare alike.
fn canonical_number_bits(x: f64) -> u64 {
  if x.is_nan() {
    f64::NAN.to_bits()
  } else if x == 0.0 {
    0f64.to_bits()
  } else {
    x.to_bits()
  }
}

/// The SameValueZero predicate over decoded values. Numbers compare by
/// numeric value regardless of wire form; objects compare by identity.
pub fn same_value_zero(left: &Value, right: &Value) -> bool {
  fn number(value: &Value) -> Option<f64> {
    match value {
      Value::Int32(n) => Some(*n as f64),
      Value::Uint32(n) => Some(*n as f64),
      Value::Double(n) => Some(*n),
      _ => None,
    }
  }
  if let (Some(a), Some(b)) = (number(left), number(right)) {
    return canonical_number_bits(a) == canonical_number_bits(b);
  }
  match (left, right) {
    (Value::Undefined, Value::Undefined) => true,
    (Value::Null, Value::Null) => true,
    (Value::Bool(a), Value::Bool(b)) => a == b,
    (Value::BigInt(a), Value::BigInt(b)) => a == b,
    (Value::String(a), Value::String(b)) => a == b,
    (Value::Object(a), Value::Object(b)) => a == b,
    _ => false,
  }
}

/// A contiguous byte buffer, optionally resizable up to `max_byte_length`.
#[derive(Debug, PartialEq)]
pub struct ArrayBuffer {
  data: Vec<u8>,
  max_byte_length: Option<u32>,
}

impl ArrayBuffer {
  pub fn new(data: Vec<u8>) -> ArrayBuffer {
    ArrayBuffer {
      data,
      max_byte_length: None,
    }
  }

  /// A resizable buffer. `max_byte_length` saturates up to the current
  /// length if it is smaller.
  pub fn resizable(data: Vec<u8>, max_byte_length: u32) -> ArrayBuffer {
    let max_byte_length = max_byte_length.max(data.len() as u32);
    ArrayBuffer {
      data,
      max_byte_length: Some(max_byte_length),
    }
  }

  pub(crate) fn with_max_byte_length(
    data: Vec<u8>,
    max_byte_length: Option<u32>,
  ) -> ArrayBuffer {
    ArrayBuffer {
      data,
      max_byte_length,
    }
  }

  pub fn byte_length(&self) -> u32 {
    self.data.len() as u32
  }

  pub fn max_byte_length(&self) -> Option<u32> {
    self.max_byte_length
  }

  pub fn is_resizable(&self) -> bool {
    self.max_byte_length.is_some()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }
}

/// A buffer whose memory travels out of band; only the id of the entry in
/// the caller-maintained table is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedArrayBuffer {
  pub transfer_id: u32,
}

/// A transferred (detached-on-send) buffer for which no table entry was
/// registered at decode time; the id is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBufferTransfer {
  pub transfer_id: u32,
}

/// Element kind of a typed-array view or DataView.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
  Int8,
  Uint8,
  Uint8Clamped,
  Int16,
  Uint16,
  Int32,
  Uint32,
  Float16,
  Float32,
  Float64,
  BigInt64,
  BigUint64,
  DataView,
}

impl ViewKind {
  pub fn element_width(self) -> u32 {
    match self {
      ViewKind::Int8 | ViewKind::Uint8 | ViewKind::Uint8Clamped => 1,
      ViewKind::Int16 | ViewKind::Uint16 | ViewKind::Float16 => 2,
      ViewKind::Int32 | ViewKind::Uint32 | ViewKind::Float32 => 4,
      ViewKind::Float64 | ViewKind::BigInt64 | ViewKind::BigUint64 => 8,
      ViewKind::DataView => 1,
    }
  }

  pub(crate) fn from_tag(tag: ViewTag) -> ViewKind {
    match tag {
      ViewTag::Int8Array => ViewKind::Int8,
      ViewTag::Uint8Array => ViewKind::Uint8,
      ViewTag::Uint8ClampedArray => ViewKind::Uint8Clamped,
      ViewTag::Int16Array => ViewKind::Int16,
      ViewTag::Uint16Array => ViewKind::Uint16,
      ViewTag::Int32Array => ViewKind::Int32,
      ViewTag::Uint32Array => ViewKind::Uint32,
      ViewTag::Float16Array => ViewKind::Float16,
      ViewTag::Float32Array => ViewKind::Float32,
      ViewTag::Float64Array => ViewKind::Float64,
      ViewTag::BigInt64Array => ViewKind::BigInt64,
      ViewTag::BigUint64Array => ViewKind::BigUint64,
      ViewTag::DataView => ViewKind::DataView,
    }
  }

  pub(crate) fn tag(self) -> ViewTag {
    match self {
      ViewKind::Int8 => ViewTag::Int8Array,
      ViewKind::Uint8 => ViewTag::Uint8Array,
      ViewKind::Uint8Clamped => ViewTag::Uint8ClampedArray,
      ViewKind::Int16 => ViewTag::Int16Array,
      ViewKind::Uint16 => ViewTag::Uint16Array,
      ViewKind::Int32 => ViewTag::Int32Array,
      ViewKind::Uint32 => ViewTag::Uint32Array,
      ViewKind::Float16 => ViewTag::Float16Array,
      ViewKind::Float32 => ViewTag::Float32Array,
      ViewKind::Float64 => ViewTag::Float64Array,
      ViewKind::BigInt64 => ViewTag::BigInt64Array,
      ViewKind::BigUint64 => ViewTag::BigUint64Array,
      ViewKind::DataView => ViewTag::DataView,
    }
  }
}

impl Display for ViewKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ViewKind::Int8 => "Int8Array",
      ViewKind::Uint8 => "Uint8Array",
      ViewKind::Uint8Clamped => "Uint8ClampedArray",
      ViewKind::Int16 => "Int16Array",
      ViewKind::Uint16 => "Uint16Array",
      ViewKind::Int32 => "Int32Array",
      ViewKind::Uint32 => "Uint32Array",
      ViewKind::Float16 => "Float16Array",
      ViewKind::Float32 => "Float32Array",
      ViewKind::Float64 => "Float64Array",
      ViewKind::BigInt64 => "BigInt64Array",
      ViewKind::BigUint64 => "BigUint64Array",
      ViewKind::DataView => "DataView",
    };
    write!(f, "{}", name)
  }
}

bitflags::bitflags! {
  /// Per-view wire flags, present from wire version 14. Both bits need the
  /// `ResizableArrayBuffers` feature.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  #[repr(transparent)]
  pub struct ViewFlags: u32 {
    const LENGTH_TRACKING = 1 << 0;
    const BACKED_BY_RESIZABLE = 1 << 1;
  }
}

/// A sub-range of a backing buffer, referenced by identity.
#[derive(Debug)]
pub struct BufferView {
  pub kind: ViewKind,
  pub buffer: ObjectId,
  pub byte_offset: u32,
  /// Byte length of the range. Derived at access time instead when
  /// `LENGTH_TRACKING` is set.
  pub byte_length: u32,
  pub flags: ViewFlags,
}

impl BufferView {
  /// Length in elements.
  pub fn length(&self) -> u32 {
    self.byte_length / self.kind.element_width()
  }

  pub fn is_length_tracking(&self) -> bool {
    self.flags.contains(ViewFlags::LENGTH_TRACKING)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorName {
  Error,
  EvalError,
  RangeError,
  ReferenceError,
  SyntaxError,
  TypeError,
  UriError,
}

impl Display for ErrorName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      ErrorName::Error => "Error",
      ErrorName::EvalError => "EvalError",
      ErrorName::RangeError => "RangeError",
      ErrorName::ReferenceError => "ReferenceError",
      ErrorName::SyntaxError => "SyntaxError",
      ErrorName::TypeError => "TypeError",
      ErrorName::UriError => "URIError",
    };
    write!(f, "{}", name)
  }
}

/// A serialized `Error` object. The cause is a full value and may point
/// back at the error itself.
#[derive(Debug)]
pub struct JsError {
  pub name: ErrorName,
  pub message: Option<JsString>,
  pub stack: Option<JsString>,
  pub cause: Option<Value>,
}

/// Structural equivalence of two values, each interpreted against its own
/// graph. Follows shared and cyclic references by pairing ids on both
/// sides, so it terminates on any graph; NaN equals NaN, a hole is not
/// `Undefined`, and host objects never compare equal (their payloads are
/// opaque to the codec).
pub fn value_eq(
  left: (&Value, &ValueGraph),
  right: (&Value, &ValueGraph),
) -> bool {
  let mut cx = EqCx {
    left_graph: left.1,
    right_graph: right.1,
    visited: HashSet::new(),
  };
  cx.values(left.0, right.0)
}

struct EqCx<'a> {
  left_graph: &'a ValueGraph,
  right_graph: &'a ValueGraph,
  visited: HashSet<(u32, u32)>,
}

impl EqCx<'_> {
  fn values(&mut self, left: &Value, right: &Value) -> bool {
    match (left, right) {
      (Value::Undefined, Value::Undefined) => true,
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Int32(a), Value::Int32(b)) => a == b,
      (Value::Uint32(a), Value::Uint32(b)) => a == b,
      (Value::Double(a), Value::Double(b)) => {
        (a.is_nan() && b.is_nan()) || a == b
      }
      (Value::BigInt(a), Value::BigInt(b)) => a == b,
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Object(a), Value::Object(b)) => self.objects(*a, *b),
      _ => false,
    }
  }

  fn objects(&mut self, left: ObjectId, right: ObjectId) -> bool {
    if !self.visited.insert((left.index, right.index)) {
      // This pair is already being compared further up the stack; assuming
      // equality here is what makes the bisimulation terminate.
      return true;
    }
    let (Some(left), Some(right)) = (
      self.left_graph.lookup(left),
      self.right_graph.lookup(right),
    ) else {
      return false;
    };
    match (left, right) {
      (ObjectValue::Boxed(a), ObjectValue::Boxed(b)) => boxed_eq(a, b),
      (ObjectValue::Date(a), ObjectValue::Date(b)) => a == b,
      (ObjectValue::RegExp(a), ObjectValue::RegExp(b)) => a == b,
      (ObjectValue::Object(a), ObjectValue::Object(b)) => {
        self.property_maps(a, b)
      }
      (ObjectValue::DenseArray(a), ObjectValue::DenseArray(b)) => {
        self.dense_arrays(a, b)
      }
      (ObjectValue::SparseArray(a), ObjectValue::SparseArray(b)) => {
        a.length == b.length && self.property_maps(&a.properties, &b.properties)
      }
      (ObjectValue::Map(a), ObjectValue::Map(b)) => self.maps(a, b),
      (ObjectValue::Set(a), ObjectValue::Set(b)) => self.sets(a, b),
      (ObjectValue::ArrayBuffer(a), ObjectValue::ArrayBuffer(b)) => a == b,
      (
        ObjectValue::SharedArrayBuffer(a),
        ObjectValue::SharedArrayBuffer(b),
      ) => a == b,
      (
        ObjectValue::ArrayBufferTransfer(a),
        ObjectValue::ArrayBufferTransfer(b),
      ) => a == b,
      (ObjectValue::View(a), ObjectValue::View(b)) => {
        a.kind == b.kind
          && a.byte_offset == b.byte_offset
          && a.byte_length == b.byte_length
          && a.flags == b.flags
          && self.objects(a.buffer, b.buffer)
      }
      (ObjectValue::Error(a), ObjectValue::Error(b)) => self.errors(a, b),
      _ => false,
    }
  }

  fn property_maps(&mut self, left: &PropertyMap, right: &PropertyMap) -> bool {
    if left.len() != right.len() {
      return false;
    }
    left.iter().zip(right.iter()).all(
      |((left_key, left_value), (right_key, right_value))| {
        left_key == right_key && self.values(left_value, right_value)
      },
    )
  }

  fn dense_arrays(&mut self, left: &DenseArray, right: &DenseArray) -> bool {
    if left.elements.len() != right.elements.len() {
      return false;
    }
    let elements_eq = left.elements.iter().zip(right.elements.iter()).all(
      |(left_slot, right_slot)| match (left_slot, right_slot) {
        (Some(left_value), Some(right_value)) => {
          self.values(left_value, right_value)
        }
        (None, None) => true,
        _ => false,
      },
    );
    elements_eq && self.property_maps(&left.properties, &right.properties)
  }

  fn maps(&mut self, left: &JsMap, right: &JsMap) -> bool {
    if left.len() != right.len() {
      return false;
    }
    left.iter().zip(right.iter()).all(
      |((left_key, left_value), (right_key, right_value))| {
        self.values(left_key, right_key) && self.values(left_value, right_value)
      },
    )
  }

  fn sets(&mut self, left: &JsSet, right: &JsSet) -> bool {
    if left.len() != right.len() {
      return false;
    }
    left
      .iter()
      .zip(right.iter())
      .all(|(left_value, right_value)| self.values(left_value, right_value))
  }

  fn errors(&mut self, left: &JsError, right: &JsError) -> bool {
    if left.name != right.name
      || left.message != right.message
      || left.stack != right.stack
    {
      return false;
    }
    match (&left.cause, &right.cause) {
      (Some(left_cause), Some(right_cause)) => {
        self.values(left_cause, right_cause)
      }
      (None, None) => true,
      _ => false,
    }
  }
}

fn boxed_eq(left: &BoxedPrimitive, right: &BoxedPrimitive) -> bool {
  match (left, right) {
    (BoxedPrimitive::Bool(a), BoxedPrimitive::Bool(b)) => a == b,
    (BoxedPrimitive::Number(a), BoxedPrimitive::Number(b)) => {
      (a.is_nan() && b.is_nan()) || a == b
    }
    (BoxedPrimitive::BigInt(a), BoxedPrimitive::BigInt(b)) => a == b,
    (BoxedPrimitive::String(a), BoxedPrimitive::String(b)) => a == b,
    _ => false,
  }
}
