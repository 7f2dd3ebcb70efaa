use protograph::config::ProtoGraphConfig;
use protograph::pipeline::*;
use protograph::render::stable_id;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ORDERS: &str = r#"
syntax = "proto3";
package acme.orders;

import "common.proto";
import "google/api/annotations.proto";

message Order {
  string id = 1;
  acme.common.Money total = 2;
  Unknown mystery = 3;
}

service Orders {
  rpc Get(GetOrderRequest) returns (Order);
}

message GetOrderRequest { string id = 1; }
"#;

const COMMON: &str = r#"
syntax = "proto3";
package acme.common;

message Money {
  int64 units = 1;
  Currency currency = 2;
}

enum Currency {
  CURRENCY_UNSPECIFIED = 0;
  EUR = 1;
}
"#;

/// Writes the sample schema tree and returns a config writing into `<dir>/out`.
fn setup(dir: &Path) -> ProtoGraphConfig {
    let protos = dir.join("protos");
    fs::create_dir_all(&protos).unwrap();
    fs::write(protos.join("orders.proto"), ORDERS).unwrap();
    fs::write(protos.join("common.proto"), COMMON).unwrap();

    ProtoGraphConfig {
        output_dir: dir.join("out").to_string_lossy().to_string(),
        ..ProtoGraphConfig::default()
    }
}

#[test]
fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let path = dir.path().join("protos/orders.proto");

    let mut graph = ProtoGraph::open(&path, &config).unwrap();
    assert_eq!(graph.root(), "orders.proto");
    assert_eq!(graph.package(), "acme.orders");

    // Units: root, its sibling and the tolerated missing import.
    let units = graph.source_units();
    assert_eq!(units.len(), 3);
    assert!(units["google/api/annotations.proto"].missing);
    assert!(!units["common.proto"].missing);

    let stats = graph.stats();
    assert_eq!(stats.file_count, 2);
    assert_eq!(stats.missing_file_count, 1);
    assert_eq!(stats.unresolved_count, 1);
    assert_eq!(stats.entities_by_kind.get("rpc"), Some(&1));

    // Whole graph: imported files are clustered, the root is not.
    let whole = graph.render(None).unwrap();
    assert!(whole.starts_with("/*"), "got: {whole}");
    assert!(whole.contains("digraph protograph {"));
    assert!(whole.contains(&format!("subgraph cluster_{}", &stable_id("common.proto")[1..13])));
    assert!(!whole.contains(&format!("subgraph cluster_{}", &stable_id("orders.proto")[1..13])));

    let order = graph.registry().get("acme.orders.Order").unwrap().alias.clone();
    let money = graph.registry().get("acme.common.Money").unwrap().alias.clone();
    assert!(
        whole.contains(&format!("{order}:po_total:e -> {money}")),
        "got: {whole}"
    );
    assert!(whole.contains("Unknown (missing)"), "got: {whole}");

    // Selection: only what Money reaches.
    let selected = graph.render(Some("Money")).unwrap();
    assert!(selected.contains("selection: Money"));
    assert!(selected.contains(&format!("{money} [shape=plaintext")));
    assert!(!selected.contains(&format!("{order} [shape=plaintext")));
    assert!(!selected.contains("subgraph cluster_"));

    // Imports tree.
    let imports = graph.render(Some("imports")).unwrap();
    assert!(imports.contains(&format!(
        "{} -> {}",
        stable_id("orders.proto"),
        stable_id("common.proto")
    )));
    assert!(imports.contains("(missing)"));
}

#[test]
fn test_render_to_file_names_output() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let input = dir.path().join("protos/orders.proto");
    let input = input.to_string_lossy();

    let whole = render_to_file(&input, None, &config, None).unwrap();
    assert_eq!(whole, dir.path().join("out/orders.dot"));
    assert!(whole.exists());

    let selected = render_to_file(&input, Some("Orders.Get"), &config, None).unwrap();
    assert_eq!(selected, dir.path().join("out/orders_Orders.Get.dot"));
    let content = fs::read_to_string(&selected).unwrap();
    assert!(content.contains("Get_request"), "got: {content}");

    let named = render_to_file(&input, None, &config, Some("custom")).unwrap();
    assert_eq!(named, dir.path().join("out/custom.dot"));
}

#[test]
fn test_strict_modes_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let path = dir.path().join("protos/orders.proto");

    let strict_imports = ProtoGraphConfig {
        allow_missing_imports: false,
        ..config.clone()
    };
    assert!(matches!(
        ProtoGraph::open(&path, &strict_imports),
        Err(protograph::errors::ProtoGraphError::MissingImport { .. })
    ));

    let strict_types = ProtoGraphConfig {
        show_missing_types: false,
        ..config
    };
    assert!(matches!(
        ProtoGraph::open(&path, &strict_types),
        Err(protograph::errors::ProtoGraphError::UnresolvedReference { .. })
    ));
}

#[test]
fn test_batch_over_directory_continues_after_failure() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let protos = dir.path().join("protos");
    fs::write(protos.join("broken.proto"), "message {\n").unwrap();
    fs::create_dir_all(protos.join("vendor")).unwrap();
    fs::write(protos.join("vendor/skipped.proto"), "message Skipped {}\n").unwrap();

    let outcomes = run_batch(&protos.to_string_lossy(), None, &config, None).unwrap();
    assert_eq!(outcomes.len(), 3, "got: {outcomes:?}");

    let failed: Vec<&RunOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].input.ends_with("broken.proto"));
    assert!(dir.path().join("out/orders.dot").exists());
    assert!(dir.path().join("out/common.dot").exists());
}

#[test]
fn test_list_input() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let list = dir.path().join("inputs.txt");
    fs::write(
        &list,
        format!(
            "# roots\n{}\n\n",
            dir.path().join("protos/common.proto").display()
        ),
    )
    .unwrap();

    let inputs = expand_inputs(&format!("{LIST_PREFIX}{}", list.display()), &config).unwrap();
    assert_eq!(inputs.len(), 1);
    assert!(inputs[0].ends_with("common.proto"));
}

#[test]
fn test_glob_input() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let pattern = format!("{}/protos/*.proto", dir.path().display());

    let inputs = expand_inputs(&pattern, &config).unwrap();
    assert_eq!(inputs.len(), 2);

    let none = format!("{}/protos/*.nothing", dir.path().display());
    assert!(expand_inputs(&none, &config).is_err());
}

#[test]
fn test_blob_input() {
    let dir = TempDir::new().unwrap();
    let config = setup(dir.path());
    let blob = "syntax = \"proto3\";\npackage inline;\nmessage Inline { Other o = 1; }\nmessage Other {}\n";

    let path = render_to_file(blob, None, &config, None).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("blob_") && name.ends_with(".dot"), "got: {name}");
}
