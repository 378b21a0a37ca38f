use v8_structured_clone::GraphBuilder;
use v8_structured_clone::Value;
use v8_structured_clone::ValueGraph;

/// Builds a graph with the given function, then asserts the value survives
/// two encode/decode round trips under graph-aware equivalence.
#[macro_export]
macro_rules! roundtrip_test {
  ($name:ident $build:expr) => {
    #[test]
    fn $name() {
      let build: fn(
        &mut v8_structured_clone::GraphBuilder,
      ) -> v8_structured_clone::Value = $build;
      let (value, graph) = $crate::util::build_graph(build);
      $crate::util::assert_roundtrip(&value, &graph);
    }
  };
}

#[allow(dead_code)]
pub fn build_graph(
  build: fn(&mut GraphBuilder) -> Value,
) -> (Value, ValueGraph) {
  let mut builder = GraphBuilder::new();
  let value = build(&mut builder);
  let graph = builder.finish().expect("graph has unfilled slots");
  (value, graph)
}

#[allow(dead_code)]
pub fn assert_roundtrip(value: &Value, graph: &ValueGraph) {
  let bytes = v8_structured_clone::encode(graph, value).expect("encode failed");
  let (decoded, decoded_graph) =
    v8_structured_clone::decode(&bytes).expect("decode failed");
  assert!(
    v8_structured_clone::value_eq((value, graph), (&decoded, &decoded_graph)),
    "roundtrip changed the value\n input: {:?}\n {:?}\n output: {:?}\n {:?}",
    value,
    graph,
    decoded,
    decoded_graph,
  );

  // The decoded graph must serialize back to an equivalent value too.
  let bytes = v8_structured_clone::encode(&decoded_graph, &decoded)
    .expect("re-encode failed");
  let (again, again_graph) =
    v8_structured_clone::decode(&bytes).expect("re-decode failed");
  assert!(v8_structured_clone::value_eq(
    (&decoded, &decoded_graph),
    (&again, &again_graph)
  ));
}
