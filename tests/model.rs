use std::collections::HashSet;

use num_bigint::BigInt;
use v8_structured_clone::same_value_zero;
use v8_structured_clone::value_eq;
use v8_structured_clone::Date;
use v8_structured_clone::GraphBuilder;
use v8_structured_clone::JsMap;
use v8_structured_clone::JsSet;
use v8_structured_clone::JsString;
use v8_structured_clone::Latin1String;
use v8_structured_clone::ObjectValue;
use v8_structured_clone::PropertyKey;
use v8_structured_clone::PropertyMap;
use v8_structured_clone::SparseArray;
use v8_structured_clone::Utf16String;
use v8_structured_clone::Value;

#[test]
fn same_value_zero_number_identities() {
  assert!(same_value_zero(
    &Value::Double(f64::NAN),
    &Value::Double(f64::NAN)
  ));
  assert!(same_value_zero(&Value::Double(0.0), &Value::Double(-0.0)));
  assert!(same_value_zero(&Value::Int32(1), &Value::Double(1.0)));
  assert!(same_value_zero(&Value::Uint32(7), &Value::Int32(7)));
  assert!(!same_value_zero(&Value::Double(1.0), &Value::Double(2.0)));
  // BigInts are not numbers.
  assert!(!same_value_zero(
    &Value::BigInt(BigInt::from(1)),
    &Value::Int32(1)
  ));
}

#[test]
fn set_deduplicates_under_same_value_zero() {
  let mut set = JsSet::new();
  assert!(set.insert(Value::Double(f64::NAN)));
  assert!(!set.insert(Value::Double(f64::NAN)));
  assert!(set.insert(Value::Double(0.0)));
  assert!(!set.insert(Value::Double(-0.0)));
  assert!(!set.insert(Value::Int32(0)));
  assert!(set.insert(Value::from("asd")));
  assert_eq!(set.len(), 3);
}

#[test]
fn map_duplicate_keys_keep_first_position_last_value() {
  let mut map = JsMap::new();
  map.insert(Value::Int32(1), Value::from("a"));
  map.insert(Value::Int32(2), Value::from("b"));
  map.insert(Value::Double(1.0), Value::from("c"));
  assert_eq!(map.len(), 2);
  let entries: Vec<_> = map.iter().collect();
  assert!(matches!(entries[0].0, Value::Int32(1)));
  assert!(matches!(entries[0].1, Value::String(s) if *s == JsString::new("c")));
  assert!(matches!(entries[1].0, Value::Int32(2)));
}

#[test]
fn map_object_keys_compare_by_identity() {
  let mut graph = GraphBuilder::new();
  let a = graph.insert(ObjectValue::Object(PropertyMap::new()));
  let b = graph.insert(ObjectValue::Object(PropertyMap::new()));
  let mut map = JsMap::new();
  map.insert(Value::Object(a), Value::Int32(1));
  map.insert(Value::Object(b), Value::Int32(2));
  map.insert(Value::Object(a), Value::Int32(3));
  assert_eq!(map.len(), 2);
  assert!(matches!(map.get(&Value::Object(a)), Some(Value::Int32(3))));
}

#[test]
fn property_keys_canonicalize_array_indexes() {
  assert!(matches!(PropertyKey::from_str("0"), PropertyKey::Index(0)));
  assert!(matches!(PropertyKey::from_str("10"), PropertyKey::Index(10)));
  assert!(matches!(
    PropertyKey::from_str("4294967295"),
    PropertyKey::Index(u32::MAX)
  ));
  assert!(matches!(
    PropertyKey::from_str("4294967296"),
    PropertyKey::String(_)
  ));
  assert!(matches!(PropertyKey::from_str("010"), PropertyKey::String(_)));
  assert!(matches!(PropertyKey::from_str("-1"), PropertyKey::String(_)));
  assert!(matches!(PropertyKey::from_str("1.5"), PropertyKey::String(_)));
  assert!(matches!(PropertyKey::from_str(""), PropertyKey::String(_)));
  assert!(matches!(PropertyKey::from_double(3.0), PropertyKey::Index(3)));
  assert!(matches!(
    PropertyKey::from_double(1.5),
    PropertyKey::String(_)
  ));
}

#[test]
fn strings_compare_across_wire_forms() {
  // U+00E9 as Latin-1 and as UTF-16.
  let one_byte = JsString::OneByte(Latin1String::new(vec![0xe9]));
  let two_byte = JsString::TwoByte(Utf16String::new(vec![0x00e9]));
  assert_eq!(one_byte, two_byte);

  let mut set = HashSet::new();
  set.insert(one_byte);
  assert!(set.contains(&two_byte));

  assert_ne!(JsString::new("a"), JsString::new("b"));
}

#[test]
fn latin1_decodes_to_text() {
  let s = Latin1String::new(vec![b'c', b'a', b'f', 0xe9]);
  assert_eq!(s.as_str(), "caf\u{e9}");
}

#[test]
fn dates_clamp_and_normalize() {
  assert!(!Date::from_epoch_millis(8.64e15 + 1.0).is_valid());
  assert!(Date::from_epoch_millis(8.64e15).is_valid());
  assert_eq!(Date::from_epoch_millis(1.5).millis(), Some(1));
  assert_eq!(Date::from_epoch_millis(-1.5).millis(), Some(-1));
  assert!(Date::from_epoch_millis(-0.4).epoch_millis().is_sign_positive());
  assert_eq!(Date::invalid().millis(), None);
  assert_eq!(Date::invalid(), Date::from_epoch_millis(f64::NAN));
}

#[test]
fn sparse_arrays_distinguish_holes() {
  let mut properties = PropertyMap::new();
  properties.insert(PropertyKey::Index(1), Value::Undefined);
  let array = SparseArray {
    length: 3,
    properties,
  };
  assert!(array.element(0).is_none());
  assert!(matches!(array.element(1), Some(Value::Undefined)));
  assert!(array.element(2).is_none());
}

#[test]
fn value_eq_follows_cycles() {
  let build = |flip: bool| {
    let mut graph = GraphBuilder::new();
    let id = graph.reserve();
    let mut properties = PropertyMap::new();
    properties.insert(PropertyKey::from_str("next"), Value::Object(id));
    properties.insert(PropertyKey::from_str("flag"), Value::Bool(flip));
    graph.fill(id, ObjectValue::Object(properties));
    (Value::Object(id), graph.finish().unwrap())
  };
  let (a_value, a_graph) = build(true);
  let (b_value, b_graph) = build(true);
  let (c_value, c_graph) = build(false);
  assert!(value_eq((&a_value, &a_graph), (&b_value, &b_graph)));
  assert!(!value_eq((&a_value, &a_graph), (&c_value, &c_graph)));
}

#[test]
fn value_eq_accepts_copies_for_shared_nodes() {
  // [x, x] with one shared object vs two structurally equal objects: the
  // trees look alike, and the bisimulation accepts both pairings.
  let mut graph = GraphBuilder::new();
  let shared = graph.insert(ObjectValue::Object(PropertyMap::new()));
  let array = graph.insert(ObjectValue::DenseArray(
    v8_structured_clone::DenseArray {
      elements: vec![Some(Value::Object(shared)), Some(Value::Object(shared))],
      properties: PropertyMap::new(),
    },
  ));
  let shared_graph = graph.finish().unwrap();

  let mut graph = GraphBuilder::new();
  let first = graph.insert(ObjectValue::Object(PropertyMap::new()));
  let second = graph.insert(ObjectValue::Object(PropertyMap::new()));
  let copied = graph.insert(ObjectValue::DenseArray(
    v8_structured_clone::DenseArray {
      elements: vec![Some(Value::Object(first)), Some(Value::Object(second))],
      properties: PropertyMap::new(),
    },
  ));
  let copied_graph = graph.finish().unwrap();

  assert!(value_eq(
    (&Value::Object(array), &shared_graph),
    (&Value::Object(copied), &copied_graph)
  ));
}
