use protograph::types::*;

#[test]
fn entity_kind_as_str_roundtrip() {
    let kinds = vec![
        EntityKind::Message,
        EntityKind::Enum,
        EntityKind::Service,
        EntityKind::Rpc,
        EntityKind::Missing,
    ];

    for kind in kinds {
        let s = kind.as_str();
        let parsed = EntityKind::from_str(s)
            .unwrap_or_else(|| panic!("failed to parse EntityKind from '{}'", s));
        assert_eq!(kind, parsed, "roundtrip failed for EntityKind::{}", s);
    }
}

#[test]
fn entity_kind_from_str_unknown_returns_none() {
    assert!(EntityKind::from_str("oneof").is_none());
    assert!(EntityKind::from_str("").is_none());
}

#[test]
fn only_messages_and_enums_are_types() {
    assert!(EntityKind::Message.is_type());
    assert!(EntityKind::Enum.is_type());
    assert!(!EntityKind::Service.is_type());
    assert!(!EntityKind::Rpc.is_type());
    assert!(!EntityKind::Missing.is_type());
}

#[test]
fn scalar_types_are_recognized() {
    assert!(is_scalar_type("sfixed64"));
    assert!(is_scalar_type("bytes"));
    assert!(!is_scalar_type("Bytes"));
    assert!(!is_scalar_type("google.protobuf.Any"));
}

#[test]
fn namespace_of_strips_short_name() {
    assert_eq!(namespace_of("a.b.Foo", "Foo"), "a.b");
    assert_eq!(namespace_of("a.Outer.Inner", "Inner"), "a.Outer");
    assert_eq!(namespace_of("Foo", "Foo"), "");
    assert_eq!(namespace_of("a.Foo", "Bar"), "");
}

#[test]
fn scope_prefix_respects_component_boundaries() {
    assert!(is_scope_prefix("", "a.b"));
    assert!(is_scope_prefix("a", "a.b"));
    assert!(is_scope_prefix("a.b", "a.b"));
    assert!(!is_scope_prefix("a.b", "a.bc"));
    assert!(!is_scope_prefix("a.b.c", "a.b"));
}

#[test]
fn component_suffix_matching() {
    assert!(has_component_suffix("acme.orders.Order", "Order"));
    assert!(has_component_suffix("acme.orders.Order", "orders.Order"));
    assert!(has_component_suffix("Order", "Order"));
    assert!(!has_component_suffix("acme.orders.SubOrder", "Order"));
}

#[test]
fn missing_source_unit_defaults() {
    let unit = SourceUnit::missing("google/api/annotations.proto");
    assert!(unit.missing);
    assert!(!unit.weak);
    assert!(unit.imports.is_empty());
    assert_eq!(unit.syntax, Syntax::Proto2);
    assert_eq!(unit.syntax.as_str(), "proto2");
}

#[test]
fn edition_syntax_keeps_its_label() {
    assert_eq!(Syntax::Editions("2023".to_string()).as_str(), "2023");
    assert_eq!(Syntax::Proto3.as_str(), "proto3");
}

#[test]
fn subgraph_contains_by_qualified_name() {
    let subgraph = Subgraph {
        entities: vec![Entity {
            qualified_name: "a.Foo".to_string(),
            name: "Foo".to_string(),
            kind: EntityKind::Message,
            alias: "Foo_100".to_string(),
            source: "a.proto".to_string(),
            parent: None,
            artifact: None,
            rpc: None,
        }],
        ..Subgraph::default()
    };
    assert!(subgraph.contains("a.Foo"));
    assert!(!subgraph.contains("Foo"));
}

#[test]
fn run_options_default_is_tolerant() {
    let options = RunOptions::default();
    assert!(options.allow_missing_imports);
    assert!(options.show_missing_types);
}
