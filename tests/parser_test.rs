use protograph::errors::ProtoGraphError;
use protograph::schema::*;
use protograph::types::Syntax;

fn parse(source: &str) -> SchemaFile {
    parse_schema("test.proto", source).unwrap()
}

fn first_message(file: &SchemaFile) -> &Message {
    file.messages().next().expect("no message parsed")
}

#[test]
fn test_parse_header() {
    let file = parse(
        r#"
syntax = "proto3";
package acme.billing.v1;

import "google/protobuf/timestamp.proto";
import weak "legacy.proto";
import public "shared.proto";

option go_package = "acme/billing";
"#,
    );

    assert_eq!(file.syntax, Syntax::Proto3);
    assert_eq!(file.package_name(), "acme.billing.v1");
    let imports: Vec<(&str, ImportModifier)> = file
        .imports
        .iter()
        .map(|i| (i.path.as_str(), i.modifier))
        .collect();
    assert_eq!(
        imports,
        vec![
            ("google/protobuf/timestamp.proto", ImportModifier::None),
            ("legacy.proto", ImportModifier::Weak),
            ("shared.proto", ImportModifier::Public),
        ]
    );
    assert!(file
        .elements
        .iter()
        .any(|e| matches!(e, FileElement::Option(o) if o.name == "go_package")));
}

#[test]
fn test_default_syntax_is_proto2() {
    let file = parse("message A {}\n");
    assert_eq!(file.syntax, Syntax::Proto2);
    assert_eq!(file.package_name(), "");
}

#[test]
fn test_edition() {
    let file = parse("edition = \"2023\";\nmessage A {}\n");
    assert_eq!(file.syntax, Syntax::Editions("2023".to_string()));
}

#[test]
fn test_parse_message_fields() {
    let file = parse(
        r#"
syntax = "proto2";
message Order {
  required string id = 1;
  repeated .acme.Item items = 2 [packed = true, (custom.opt) = "x"];
  optional Status status = 3 [default = ACTIVE];
  map<string, Item> by_sku = 4;
  reserved 5, 7 to 9, 100 to max;
  reserved "legacy", "old";
  extensions 1000 to 1999;
  // trailing note
}
"#,
    );
    let message = first_message(&file);
    assert_eq!(message.name, "Order");

    let fields: Vec<&Field> = message
        .elements
        .iter()
        .filter_map(|e| match e {
            MessageElement::Field(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].label, FieldLabel::Required);
    assert_eq!(fields[1].type_name, ".acme.Item");
    assert_eq!(fields[1].label, FieldLabel::Repeated);
    assert!(fields[1].options.is_some(), "got: {:?}", fields[1]);
    assert_eq!(fields[2].number, 3);

    let map = message
        .elements
        .iter()
        .find_map(|e| match e {
            MessageElement::Map(m) => Some(m),
            _ => None,
        })
        .expect("map field");
    assert_eq!(map.key_type, "string");
    assert_eq!(map.value_type, "Item");
    assert_eq!(map.name, "by_sku");

    let reserved: Vec<&Vec<ReservedItem>> = message
        .elements
        .iter()
        .filter_map(|e| match e {
            MessageElement::Reserved(items) => Some(items),
            _ => None,
        })
        .collect();
    assert_eq!(reserved.len(), 2);
    assert_eq!(reserved[0][0], ReservedItem::Range { start: 5, end: None });
    assert_eq!(reserved[0][1], ReservedItem::Range { start: 7, end: Some(9) });
    assert_eq!(reserved[1][0], ReservedItem::Name("legacy".to_string()));
    assert!(message
        .elements
        .iter()
        .any(|e| matches!(e, MessageElement::Extensions(_))));
    assert!(message
        .elements
        .iter()
        .any(|e| matches!(e, MessageElement::Comment(_))));
}

#[test]
fn test_nested_declarations_and_oneof() {
    let file = parse(
        r#"
syntax = "proto3";
message Outer {
  message Inner { int32 v = 1; }
  enum Kind { KIND_UNSPECIFIED = 0; KIND_A = 1; }
  oneof payload {
    Inner inner = 1;
    string text = 2;
  }
  Kind kind = 3;
}
"#,
    );
    let outer = first_message(&file);
    assert_eq!(outer.nested_messages().map(|m| m.name.as_str()).collect::<Vec<_>>(), vec!["Inner"]);
    assert_eq!(outer.nested_enums().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["Kind"]);

    let oneof = outer
        .elements
        .iter()
        .find_map(|e| match e {
            MessageElement::Oneof(o) => Some(o),
            _ => None,
        })
        .expect("oneof");
    assert_eq!(oneof.name, "payload");
    let names: Vec<&str> = oneof
        .elements
        .iter()
        .filter_map(|e| match e {
            OneofElement::Field(f) => Some(f.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["inner", "text"]);
}

#[test]
fn test_parse_enum() {
    let file = parse(
        r#"
enum Status {
  option allow_alias = true;
  UNKNOWN = 0;
  ACTIVE = 1;
  ENABLED = 1 [deprecated = true];
  NEGATIVE = -1;
  reserved 10 to 20;
}
"#,
    );
    let status = file.enums().next().expect("enum");
    let values: Vec<(&str, i64)> = status
        .elements
        .iter()
        .filter_map(|e| match e {
            EnumElement::Value(v) => Some((v.name.as_str(), v.number)),
            _ => None,
        })
        .collect();
    assert_eq!(
        values,
        vec![("UNKNOWN", 0), ("ACTIVE", 1), ("ENABLED", 1), ("NEGATIVE", -1)]
    );
    assert!(status.elements.iter().any(|e| matches!(e, EnumElement::Option(_))));
    assert!(status.elements.iter().any(|e| matches!(e, EnumElement::Reserved(_))));
}

#[test]
fn test_parse_service() {
    let file = parse(
        r#"
syntax = "proto3";
service Billing {
  option deprecated = false;
  rpc Charge(ChargeRequest) returns (ChargeResponse);
  rpc Watch(WatchRequest) returns (stream Event) {
    option idempotency_level = NO_SIDE_EFFECTS;
  }
  rpc Upload(stream Chunk) returns (google.protobuf.Empty) {}
}
"#,
    );
    let service = file.services().next().expect("service");
    let rpcs: Vec<&Rpc> = service.rpcs().collect();
    assert_eq!(rpcs.len(), 3);

    assert_eq!(rpcs[0].request_type, "ChargeRequest");
    assert_eq!(rpcs[0].response_type, "ChargeResponse");
    assert!(!rpcs[0].client_streaming && !rpcs[0].server_streaming);

    assert!(rpcs[1].server_streaming);
    assert_eq!(rpcs[1].response_type, "Event");
    assert_eq!(rpcs[1].options.len(), 1);

    assert!(rpcs[2].client_streaming);
    assert_eq!(rpcs[2].response_type, "google.protobuf.Empty");
}

#[test]
fn test_parse_stream_keyword_versus_type_name() {
    let file = parse(
        r#"
service S {
  rpc Qualified(stream .p.Foo) returns (stream .p.Foo);
  rpc Dotted(stream.Foo) returns (stream);
  rpc Bare(stream stream) returns (stream stream.Foo);
}
"#,
    );
    let rpcs: Vec<&Rpc> = file.services().next().expect("service").rpcs().collect();

    assert_eq!(rpcs[0].request_type, ".p.Foo");
    assert_eq!(rpcs[0].response_type, ".p.Foo");
    assert!(rpcs[0].client_streaming && rpcs[0].server_streaming, "got: {:?}", rpcs[0]);

    assert_eq!(rpcs[1].request_type, "stream.Foo");
    assert_eq!(rpcs[1].response_type, "stream");
    assert!(!rpcs[1].client_streaming && !rpcs[1].server_streaming, "got: {:?}", rpcs[1]);

    assert_eq!(rpcs[2].request_type, "stream");
    assert_eq!(rpcs[2].response_type, "stream.Foo");
    assert!(rpcs[2].client_streaming && rpcs[2].server_streaming, "got: {:?}", rpcs[2]);
}

#[test]
fn test_group_and_extend_are_surfaced() {
    let file = parse(
        r#"
syntax = "proto2";
message Search {
  repeated group Result = 1 {
    required string url = 2;
  }
  extensions 100 to 200;
}
extend Search {
  optional int32 rank = 100;
}
"#,
    );
    let search = first_message(&file);
    let group = search
        .elements
        .iter()
        .find_map(|e| match e {
            MessageElement::Group(g) => Some(g),
            _ => None,
        })
        .expect("group");
    assert_eq!(group.name, "Result");
    assert_eq!(group.label, FieldLabel::Repeated);
    assert!(file
        .elements
        .iter()
        .any(|e| matches!(e, FileElement::Extend(x) if x.target == "Search")));
}

#[test]
fn test_keywords_as_field_names() {
    let file = parse(
        r#"
message Tricky {
  string option = 1;
  int32 reserved = 2;
  bool message = 3;
}
"#,
    );
    let names: Vec<&str> = first_message(&file)
        .elements
        .iter()
        .filter_map(|e| match e {
            MessageElement::Field(f) => Some(f.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["option", "reserved", "message"]);
}

#[test]
fn test_parse_error_reports_line() {
    let err = parse_schema("broken.proto", "syntax = \"proto3\";\n\nmessage A {\n  int32 = 1;\n}\n")
        .unwrap_err();
    match err {
        ProtoGraphError::Parse { path, line, .. } => {
            assert_eq!(path, "broken.proto");
            assert_eq!(line, Some(4));
        }
        other => panic!("expected parse error, got: {other:?}"),
    }
}

#[test]
fn test_unexpected_character_is_parse_error() {
    let err = parse_schema("x.proto", "message A { int32 a = 1; }\n?").unwrap_err();
    assert!(matches!(err, ProtoGraphError::Parse { line: Some(2), .. }), "got: {err:?}");
}
