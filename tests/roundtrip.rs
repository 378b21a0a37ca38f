mod util;

use num_bigint::BigInt;
use v8_structured_clone::ArrayBuffer;
use v8_structured_clone::ArrayBufferTransfer;
use v8_structured_clone::BoxedPrimitive;
use v8_structured_clone::BufferView;
use v8_structured_clone::Date;
use v8_structured_clone::DenseArray;
use v8_structured_clone::ErrorName;
use v8_structured_clone::JsError;
use v8_structured_clone::JsMap;
use v8_structured_clone::JsSet;
use v8_structured_clone::JsString;
use v8_structured_clone::ObjectValue;
use v8_structured_clone::PropertyKey;
use v8_structured_clone::PropertyMap;
use v8_structured_clone::RegExp;
use v8_structured_clone::RegExpFlags;
use v8_structured_clone::SharedArrayBuffer;
use v8_structured_clone::SparseArray;
use v8_structured_clone::Value;
use v8_structured_clone::ViewFlags;
use v8_structured_clone::ViewKind;

// primitives
roundtrip_test!(undefined |_| Value::Undefined);
roundtrip_test!(null |_| Value::Null);
roundtrip_test!(bool_true |_| Value::Bool(true));
roundtrip_test!(bool_false |_| Value::Bool(false));
roundtrip_test!(int32_zero |_| Value::Int32(0));
roundtrip_test!(int32_min |_| Value::Int32(i32::MIN));
roundtrip_test!(int32_max |_| Value::Int32(i32::MAX));
roundtrip_test!(uint32_max |_| Value::Uint32(u32::MAX));
roundtrip_test!(double |_| Value::Double(1.1));
roundtrip_test!(double_nan |_| Value::Double(f64::NAN));
roundtrip_test!(double_neg_zero |_| Value::Double(-0.0));
roundtrip_test!(double_infinity |_| Value::Double(f64::INFINITY));

// bigints
roundtrip_test!(bigint_zero |_| Value::BigInt(BigInt::from(0)));
roundtrip_test!(bigint_neg |_| Value::BigInt(BigInt::from(-1)));
roundtrip_test!(bigint_u128 |_| Value::BigInt(BigInt::from(u128::MAX)));

// strings in each wire form
roundtrip_test!(string_empty |_| Value::from(""));
roundtrip_test!(string_ascii |_| Value::from("asd"));
roundtrip_test!(string_latin1 |_| Value::from("caf\u{e9}"));
roundtrip_test!(string_two_byte |_| Value::from("asd \u{1F30E}"));

// boxed primitives
roundtrip_test!(boolean_object |graph| {
  Value::Object(graph.insert(ObjectValue::Boxed(BoxedPrimitive::Bool(true))))
});
roundtrip_test!(number_object_nan |graph| {
  Value::Object(graph.insert(ObjectValue::Boxed(BoxedPrimitive::Number(
    f64::NAN,
  ))))
});
roundtrip_test!(bigint_object |graph| {
  Value::Object(graph.insert(ObjectValue::Boxed(BoxedPrimitive::BigInt(
    BigInt::from(1) << 64,
  ))))
});
roundtrip_test!(string_object |graph| {
  Value::Object(graph.insert(ObjectValue::Boxed(BoxedPrimitive::String(
    JsString::new("asd \u{1F30E}"),
  ))))
});

// dates
roundtrip_test!(date |graph| {
  Value::Object(graph.insert(ObjectValue::Date(Date::from_epoch_millis(1.0))))
});
roundtrip_test!(date_invalid |graph| {
  Value::Object(graph.insert(ObjectValue::Date(Date::invalid())))
});
roundtrip_test!(date_min |graph| {
  Value::Object(graph.insert(ObjectValue::Date(Date::from_epoch_millis(
    -8_640_000_000_000_000.0,
  ))))
});

// regexps
roundtrip_test!(regexp |graph| {
  Value::Object(graph.insert(ObjectValue::RegExp(RegExp {
    source: JsString::new("asd"),
    flags: RegExpFlags::GLOBAL | RegExpFlags::IGNORE_CASE,
  })))
});
roundtrip_test!(regexp_two_byte |graph| {
  Value::Object(graph.insert(ObjectValue::RegExp(RegExp {
    source: JsString::new("\u{1F5C4}"),
    flags: RegExpFlags::empty(),
  })))
});

// objects
roundtrip_test!(object_empty |graph| {
  Value::Object(graph.insert(ObjectValue::Object(PropertyMap::new())))
});
roundtrip_test!(object_properties |graph| {
  let mut properties = PropertyMap::new();
  properties.insert(PropertyKey::from_str("a"), Value::Int32(1));
  properties.insert(PropertyKey::from_str("b"), Value::from("two"));
  properties.insert(PropertyKey::Index(7), Value::Bool(false));
  Value::Object(graph.insert(ObjectValue::Object(properties)))
});
roundtrip_test!(object_nested |graph| {
  let mut inner = PropertyMap::new();
  inner.insert(PropertyKey::from_str("b"), Value::Bool(true));
  let inner = graph.insert(ObjectValue::Object(inner));
  let mut outer = PropertyMap::new();
  outer.insert(PropertyKey::from_str("a"), Value::Object(inner));
  Value::Object(graph.insert(ObjectValue::Object(outer)))
});

// arrays
roundtrip_test!(dense_array |graph| {
  Value::Object(graph.insert(ObjectValue::DenseArray(DenseArray {
    elements: vec![Some(Value::Int32(1)), Some(Value::from("asd"))],
    properties: PropertyMap::new(),
  })))
});
roundtrip_test!(dense_array_holes_are_not_undefined |graph| {
  Value::Object(graph.insert(ObjectValue::DenseArray(DenseArray {
    elements: vec![Some(Value::Undefined), None, Some(Value::Int32(4))],
    properties: PropertyMap::new(),
  })))
});
roundtrip_test!(dense_array_with_properties |graph| {
  let mut properties = PropertyMap::new();
  properties.insert(PropertyKey::from_str("foo"), Value::from("bar"));
  Value::Object(graph.insert(ObjectValue::DenseArray(DenseArray {
    elements: vec![Some(Value::from("asd"))],
    properties,
  })))
});
roundtrip_test!(sparse_array |graph| {
  let mut properties = PropertyMap::new();
  properties.insert(PropertyKey::Index(0), Value::from("a"));
  properties.insert(PropertyKey::Index(1), Value::from("b"));
  properties.insert(PropertyKey::Index(123_456_789), Value::from("sparse"));
  Value::Object(graph.insert(ObjectValue::SparseArray(SparseArray {
    length: 123_456_790,
    properties,
  })))
});

// maps and sets
roundtrip_test!(map_mixed_keys |graph| {
  let mut inner = PropertyMap::new();
  inner.insert(PropertyKey::from_str("a"), Value::Bool(true));
  let key_object = graph.insert(ObjectValue::Object(inner));
  let mut map = JsMap::new();
  map.insert(Value::from("k"), Value::Int32(1));
  map.insert(Value::Object(key_object), Value::Int32(2));
  map.insert(Value::Double(f64::NAN), Value::Int32(3));
  Value::Object(graph.insert(ObjectValue::Map(map)))
});
roundtrip_test!(set_values |graph| {
  let mut set = JsSet::new();
  set.insert(Value::Int32(1));
  set.insert(Value::from("two"));
  set.insert(Value::Double(f64::NAN));
  Value::Object(graph.insert(ObjectValue::Set(set)))
});

// buffers and views
roundtrip_test!(array_buffer_empty |graph| {
  Value::Object(graph.insert(ObjectValue::ArrayBuffer(ArrayBuffer::new(
    vec![],
  ))))
});
roundtrip_test!(array_buffer_resizable |graph| {
  Value::Object(graph.insert(ObjectValue::ArrayBuffer(
    ArrayBuffer::resizable(vec![1, 2], 10),
  )))
});
roundtrip_test!(uint8_view |graph| {
  let buffer =
    graph.insert(ObjectValue::ArrayBuffer(ArrayBuffer::new(vec![1, 2, 3])));
  Value::Object(graph.insert(ObjectValue::View(BufferView {
    kind: ViewKind::Uint8,
    buffer,
    byte_offset: 1,
    byte_length: 2,
    flags: ViewFlags::empty(),
  })))
});
roundtrip_test!(data_view |graph| {
  let buffer =
    graph.insert(ObjectValue::ArrayBuffer(ArrayBuffer::new(vec![0; 8])));
  Value::Object(graph.insert(ObjectValue::View(BufferView {
    kind: ViewKind::DataView,
    buffer,
    byte_offset: 3,
    byte_length: 5,
    flags: ViewFlags::empty(),
  })))
});
roundtrip_test!(bigint64_view |graph| {
  let buffer =
    graph.insert(ObjectValue::ArrayBuffer(ArrayBuffer::new(vec![0; 16])));
  Value::Object(graph.insert(ObjectValue::View(BufferView {
    kind: ViewKind::BigInt64,
    buffer,
    byte_offset: 8,
    byte_length: 8,
    flags: ViewFlags::empty(),
  })))
});
roundtrip_test!(length_tracking_view |graph| {
  let buffer = graph
    .insert(ObjectValue::ArrayBuffer(ArrayBuffer::resizable(vec![1, 2], 10)));
  Value::Object(graph.insert(ObjectValue::View(BufferView {
    kind: ViewKind::Uint8,
    buffer,
    byte_offset: 0,
    byte_length: 2,
    flags: ViewFlags::LENGTH_TRACKING | ViewFlags::BACKED_BY_RESIZABLE,
  })))
});
roundtrip_test!(float16_view |graph| {
  let buffer =
    graph.insert(ObjectValue::ArrayBuffer(ArrayBuffer::new(vec![0; 4])));
  Value::Object(graph.insert(ObjectValue::View(BufferView {
    kind: ViewKind::Float16,
    buffer,
    byte_offset: 0,
    byte_length: 4,
    flags: ViewFlags::empty(),
  })))
});
roundtrip_test!(shared_array_buffer |graph| {
  Value::Object(graph.insert(ObjectValue::SharedArrayBuffer(
    SharedArrayBuffer { transfer_id: 7 },
  )))
});
roundtrip_test!(unresolved_transfer |graph| {
  Value::Object(graph.insert(ObjectValue::ArrayBufferTransfer(
    ArrayBufferTransfer { transfer_id: 3 },
  )))
});

// errors
roundtrip_test!(error_plain |graph| {
  Value::Object(graph.insert(ObjectValue::Error(JsError {
    name: ErrorName::Error,
    message: None,
    stack: None,
    cause: None,
  })))
});
roundtrip_test!(error_full |graph| {
  let cause = graph.insert(ObjectValue::Error(JsError {
    name: ErrorName::TypeError,
    message: Some(JsString::new("inner")),
    stack: None,
    cause: None,
  }));
  Value::Object(graph.insert(ObjectValue::Error(JsError {
    name: ErrorName::SyntaxError,
    message: Some(JsString::new("outer")),
    stack: Some(JsString::new("at foo:1:1")),
    cause: Some(Value::Object(cause)),
  })))
});
roundtrip_test!(error_cyclic_cause |graph| {
  let id = graph.reserve();
  graph.fill(
    id,
    ObjectValue::Error(JsError {
      name: ErrorName::Error,
      message: None,
      stack: None,
      cause: Some(Value::Object(id)),
    }),
  );
  Value::Object(id)
});

// cycles and shared identity
roundtrip_test!(self_referential_object |graph| {
  let id = graph.reserve();
  let mut properties = PropertyMap::new();
  properties.insert(PropertyKey::from_str("foo"), Value::Object(id));
  graph.fill(id, ObjectValue::Object(properties));
  Value::Object(id)
});
roundtrip_test!(two_step_cycle |graph| {
  let a = graph.reserve();
  let mut b_properties = PropertyMap::new();
  b_properties.insert(PropertyKey::from_str("a"), Value::Object(a));
  let b = graph.insert(ObjectValue::Object(b_properties));
  let mut a_properties = PropertyMap::new();
  a_properties.insert(PropertyKey::from_str("b"), Value::Object(b));
  graph.fill(a, ObjectValue::Object(a_properties));
  Value::Object(a)
});

#[test]
fn owner_cycle_preserves_identity() {
  // bob.pets[0].owner === bob
  let (value, graph) = util::build_graph(|graph| {
    let bob = graph.reserve();
    let mut pet_properties = PropertyMap::new();
    pet_properties.insert(PropertyKey::from_str("owner"), Value::Object(bob));
    let pet = graph.insert(ObjectValue::Object(pet_properties));
    let pets = graph.insert(ObjectValue::DenseArray(DenseArray {
      elements: vec![Some(Value::Object(pet))],
      properties: PropertyMap::new(),
    }));
    let mut bob_properties = PropertyMap::new();
    bob_properties.insert(PropertyKey::from_str("pets"), Value::Object(pets));
    graph.fill(bob, ObjectValue::Object(bob_properties));
    Value::Object(bob)
  });
  util::assert_roundtrip(&value, &graph);

  let bytes = v8_structured_clone::encode(&graph, &value).unwrap();
  let (decoded, graph) = v8_structured_clone::decode(&bytes).unwrap();
  let Value::Object(bob) = decoded else {
    panic!("expected an object")
  };
  let ObjectValue::Object(bob_properties) = graph.get(bob) else {
    panic!("expected an object")
  };
  let Some(Value::Object(pets)) =
    bob_properties.get(&PropertyKey::from_str("pets"))
  else {
    panic!("expected a pets array")
  };
  let ObjectValue::DenseArray(pets) = graph.get(*pets) else {
    panic!("expected a dense array")
  };
  let Some(Some(Value::Object(pet))) = pets.elements.first() else {
    panic!("expected a pet")
  };
  let ObjectValue::Object(pet_properties) = graph.get(*pet) else {
    panic!("expected an object")
  };
  let Some(Value::Object(owner)) =
    pet_properties.get(&PropertyKey::from_str("owner"))
  else {
    panic!("expected an owner")
  };
  assert_eq!(*owner, bob);
}

#[test]
fn shared_subobject_stays_shared() {
  let (value, graph) = util::build_graph(|graph| {
    let shared = graph.insert(ObjectValue::Object(PropertyMap::new()));
    Value::Object(graph.insert(ObjectValue::DenseArray(DenseArray {
      elements: vec![
        Some(Value::Object(shared)),
        Some(Value::Object(shared)),
      ],
      properties: PropertyMap::new(),
    })))
  });
  util::assert_roundtrip(&value, &graph);

  let bytes = v8_structured_clone::encode(&graph, &value).unwrap();
  let (decoded, graph) = v8_structured_clone::decode(&bytes).unwrap();
  let Value::Object(array) = decoded else {
    panic!("expected an object")
  };
  let ObjectValue::DenseArray(array) = graph.get(array) else {
    panic!("expected a dense array")
  };
  let (Some(Some(Value::Object(first))), Some(Some(Value::Object(second)))) =
    (array.elements.first(), array.elements.get(1))
  else {
    panic!("expected two objects")
  };
  assert_eq!(first, second);
}

#[test]
fn two_views_share_one_buffer() {
  let (value, graph) = util::build_graph(|graph| {
    let buffer =
      graph.insert(ObjectValue::ArrayBuffer(ArrayBuffer::new(vec![0; 8])));
    let head = graph.insert(ObjectValue::View(BufferView {
      kind: ViewKind::Uint8,
      buffer,
      byte_offset: 0,
      byte_length: 4,
      flags: ViewFlags::empty(),
    }));
    let tail = graph.insert(ObjectValue::View(BufferView {
      kind: ViewKind::Uint8,
      buffer,
      byte_offset: 4,
      byte_length: 4,
      flags: ViewFlags::empty(),
    }));
    Value::Object(graph.insert(ObjectValue::DenseArray(DenseArray {
      elements: vec![Some(Value::Object(head)), Some(Value::Object(tail))],
      properties: PropertyMap::new(),
    })))
  });
  util::assert_roundtrip(&value, &graph);

  let bytes = v8_structured_clone::encode(&graph, &value).unwrap();
  let (decoded, graph) = v8_structured_clone::decode(&bytes).unwrap();
  let Value::Object(array) = decoded else {
    panic!("expected an object")
  };
  let ObjectValue::DenseArray(array) = graph.get(array) else {
    panic!("expected a dense array")
  };
  let (Some(Some(Value::Object(head))), Some(Some(Value::Object(tail)))) =
    (array.elements.first(), array.elements.get(1))
  else {
    panic!("expected two views")
  };
  let (ObjectValue::View(head), ObjectValue::View(tail)) =
    (graph.get(*head), graph.get(*tail))
  else {
    panic!("expected views")
  };
  assert_eq!(head.buffer, tail.buffer);
}
