use std::fs;

use protograph::errors::ProtoGraphError;
use protograph::registry::Registry;
use protograph::types::*;
use protograph::walker::*;
use tempfile::TempDir;

fn memory(files: &[(&str, &str)]) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for (name, content) in files {
        loader.insert(name, content);
    }
    loader
}

fn walk(loader: &dyn SourceLoader, root: &str, options: RunOptions) -> protograph::errors::Result<WalkResult> {
    let mut registry = Registry::new();
    ImportWalker::new(loader, &mut registry, options).walk(root)
}

const CYCLE_A: &str = "package a;\nimport \"b.proto\";\nmessage A { b.B peer = 1; }\n";
const CYCLE_B: &str = "package b;\nimport \"a.proto\";\nmessage B { a.A peer = 1; }\n";

#[test]
fn test_import_cycle_visits_each_file_once() {
    let loader = memory(&[("a.proto", CYCLE_A), ("b.proto", CYCLE_B)]);

    for root in ["a.proto", "b.proto"] {
        let result = walk(&loader, root, RunOptions::default()).unwrap();
        assert_eq!(result.root, root);
        assert_eq!(result.units.len(), 2);
        assert_eq!(result.files.len(), 2);
        assert!(result.duplicates.is_empty(), "got: {:?}", result.duplicates);
    }
}

#[test]
fn test_import_cycle_declarations_resolve_both_ways() {
    let loader = memory(&[("a.proto", CYCLE_A), ("b.proto", CYCLE_B)]);
    for root in ["a.proto", "b.proto"] {
        let graph = protograph::pipeline::ProtoGraph::load(root, &loader, RunOptions::default()).unwrap();
        let registry = graph.registry();
        let a = &registry.get("a.A").unwrap().alias;
        let b = &registry.get("b.B").unwrap().alias;
        assert!(graph.graph().targets(a, "peer").unwrap().contains_key(b));
        assert!(graph.graph().targets(b, "peer").unwrap().contains_key(a));
        assert_eq!(graph.stats().unresolved_count, 0);
    }
}

#[test]
fn test_files_complete_after_their_imports() {
    let loader = memory(&[
        ("root.proto", "import \"mid.proto\";\nmessage Root {}\n"),
        ("mid.proto", "import \"leaf.proto\";\nmessage Mid {}\n"),
        ("leaf.proto", "message Leaf {}\n"),
    ]);
    let result = walk(&loader, "root.proto", RunOptions::default()).unwrap();
    let order: Vec<&str> = result.files.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(order, vec!["leaf.proto", "mid.proto", "root.proto"]);
    assert_eq!(result.units["root.proto"].imports, vec!["mid.proto".to_string()]);
}

#[test]
fn test_diamond_import_visits_shared_file_once() {
    let loader = memory(&[
        ("root.proto", "import \"b.proto\";\nimport \"c.proto\";\nmessage Root {}\n"),
        ("b.proto", "import \"d.proto\";\nmessage B { D d = 1; }\n"),
        ("c.proto", "import \"d.proto\";\nmessage C { D d = 1; }\n"),
        ("d.proto", "message D {}\n"),
    ]);
    let result = walk(&loader, "root.proto", RunOptions::default()).unwrap();

    let shared = result.files.iter().filter(|(id, _)| id == "d.proto").count();
    assert_eq!(shared, 1);
    assert_eq!(result.units.len(), 4);
    assert!(result.units.contains_key("d.proto"));
    assert!(result.duplicates.is_empty(), "got: {:?}", result.duplicates);
    assert_eq!(result.units["c.proto"].imports, vec!["d.proto".to_string()]);
}

#[test]
fn test_missing_import_tolerated() {
    let loader = memory(&[("a.proto", "import \"gone.proto\";\nmessage A {}\n")]);
    let result = walk(&loader, "a.proto", RunOptions::default()).unwrap();

    let gone = &result.units["gone.proto"];
    assert!(gone.missing);
    assert!(!result.units["a.proto"].missing);
    assert_eq!(result.files.len(), 1);
}

#[test]
fn test_missing_import_fatal_when_strict() {
    let loader = memory(&[("a.proto", "import \"gone.proto\";\nmessage A {}\n")]);
    let options = RunOptions {
        allow_missing_imports: false,
        ..RunOptions::default()
    };
    match walk(&loader, "a.proto", options).unwrap_err() {
        ProtoGraphError::MissingImport { name, importer, .. } => {
            assert_eq!(name, "gone.proto");
            assert_eq!(importer.as_deref(), Some("a.proto"));
        }
        other => panic!("expected missing import, got: {other:?}"),
    }
}

#[test]
fn test_missing_root_is_always_fatal() {
    let loader = MemoryLoader::new();
    let err = walk(&loader, "nowhere.proto", RunOptions::default()).unwrap_err();
    assert!(
        matches!(&err, ProtoGraphError::MissingImport { importer: None, .. }),
        "got: {err:?}"
    );
}

#[test]
fn test_weak_import_marks_unit() {
    let loader = memory(&[
        ("a.proto", "import weak \"w.proto\";\nimport \"s.proto\";\n"),
        ("w.proto", "message W {}\n"),
        ("s.proto", "message S {}\n"),
    ]);
    let result = walk(&loader, "a.proto", RunOptions::default()).unwrap();
    assert!(result.units["w.proto"].weak);
    assert!(!result.units["s.proto"].weak);
}

#[test]
fn test_blob_root() {
    let blob = "syntax = \"proto3\";\npackage inline;\nmessage Inline { string s = 1; }\n";
    let result = walk(&MemoryLoader::new(), blob, RunOptions::default()).unwrap();

    assert_eq!(result.root, blob_identifier(blob));
    assert!(result.root.starts_with("blob_"));
    assert_eq!(result.units[&result.root].package, "inline");
}

#[test]
fn test_parse_error_in_import_aborts() {
    let loader = memory(&[
        ("a.proto", "import \"bad.proto\";\n"),
        ("bad.proto", "message {\n"),
    ]);
    let err = walk(&loader, "a.proto", RunOptions::default()).unwrap_err();
    assert!(matches!(&err, ProtoGraphError::Parse { path, .. } if path == "bad.proto"), "got: {err:?}");
}

#[test]
fn test_fs_loader_search_order() {
    let dir = TempDir::new().unwrap();
    let root_dir = dir.path().join("protos");
    let vendor = dir.path().join("third_party");
    fs::create_dir_all(root_dir.join("common")).unwrap();
    fs::create_dir_all(vendor.join("common")).unwrap();
    fs::write(root_dir.join("common/local.proto"), "message Local {}\n").unwrap();
    fs::write(vendor.join("common/local.proto"), "message Shadowed {}\n").unwrap();
    fs::write(vendor.join("common/vendored.proto"), "message Vendored {}\n").unwrap();

    let loader = FsLoader::new(&root_dir).with_import_path(&vendor);
    assert!(loader.load("common/local.proto").unwrap().contains("Local"));
    assert!(loader.load("common/vendored.proto").unwrap().contains("Vendored"));
    assert!(matches!(
        loader.load("common/none.proto"),
        Err(ProtoGraphError::File { .. })
    ));
}

#[test]
fn test_fs_loader_mapping() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("real.proto"), "message Real {}\n").unwrap();

    let loader = FsLoader::new(dir.path())
        .with_mapping("alias.proto", "real.proto")
        .with_mapping("stub.proto", "syntax = \"proto3\";\npackage stub;\nmessage Stub {}\n");

    assert!(loader.load("alias.proto").unwrap().contains("Real"));
    assert!(loader.load("stub.proto").unwrap().contains("message Stub"));
}
