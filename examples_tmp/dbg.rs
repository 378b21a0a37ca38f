use v8_structured_clone::{GraphBuilder, ObjectValue, RegExp, RegExpFlags, ValueEncoder, EncodeOptions, Features, Value};

fn main() {
    let mut builder = GraphBuilder::new();
    let id = builder.insert(ObjectValue::RegExp(RegExp {
        source: v8_structured_clone::JsString::new("^\\w+$"),
        flags: RegExpFlags::UNICODE_SETS,
    }));
    let graph = builder.finish().unwrap();
    let err = ValueEncoder::new(EncodeOptions {
        version: 15,
        features: Features::all() - Features::REGEXP_UNICODE_SETS,
    })
    .encode(&graph, &Value::Object(id));
    println!("{:?}", err);
}
