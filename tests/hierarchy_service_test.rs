use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};
use serde_json::{json, Value};
use tempfile::TempDir;

use hiersort::application::services::{HierarchyService, TREE_DEPTH_LIMIT};
use hiersort::application::ApplicationError;
use hiersort::config::{OutputFormat, Settings};
use hiersort::domain::BranchPolicy;
use hiersort::infrastructure::di::ServiceContainer;
use hiersort::infrastructure::traits::{FileSystem, RealFileSystem};
use hiersort::util::testing;

fn service(settings: Settings) -> HierarchyService {
    ServiceContainer::with_deps(settings, Arc::new(RealFileSystem)).hierarchy_service()
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

#[fixture]
fn workspace() -> TempDir {
    testing::init_test_setup();
    TempDir::new().unwrap()
}

fn menu() -> Value {
    json!([
        {"id": "espresso", "node": false, "parent": "coffee", "name": "Espresso"},
        {"id": "coffee", "node": true, "parent": null, "name": "Coffee"},
        {"id": "water", "node": false, "parent": null, "name": "Water"},
        {"id": "tea", "node": true, "parent": null, "name": "Tea"},
        {"id": "sencha", "node": false, "parent": "tea", "name": "Sencha"}
    ])
}

// ============================================================
// Loading
// ============================================================

#[rstest]
fn given_json_file_when_loading_then_records_parsed(workspace: TempDir) {
    // Arrange
    let path = write_json(workspace.path(), "menu.json", &menu());

    // Act
    let set = service(Settings::default()).load(&path).unwrap();

    // Assert
    assert_eq!(set.records.len(), 5);
    assert_eq!(set.origin, path.display().to_string());
}

#[rstest]
fn given_missing_file_when_loading_then_operation_failed(workspace: TempDir) {
    let path = workspace.path().join("absent.json");

    let err = service(Settings::default()).load(&path).unwrap_err();

    assert!(matches!(err, ApplicationError::OperationFailed { .. }));
    assert!(err.to_string().contains("absent.json"), "{}", err);
}

#[rstest]
fn given_malformed_json_when_loading_then_invalid_input(workspace: TempDir) {
    let path = workspace.path().join("broken.json");
    fs::write(&path, "[{\"id\": 1,").unwrap();

    let err = service(Settings::default()).load(&path).unwrap_err();

    assert!(matches!(err, ApplicationError::InvalidInput { .. }));
}

#[rstest]
fn given_unresolvable_pointer_when_parsing_then_invalid_input(workspace: TempDir) {
    let _ = workspace;
    let settings = Settings {
        records_pointer: Some("/data/missing".into()),
        ..Default::default()
    };

    let err = service(settings)
        .parse(r#"{"data": {"items": []}}"#, "doc.json")
        .unwrap_err();

    assert!(err.to_string().contains("/data/missing"), "{}", err);
}

/// Filesystem held in memory; every service file access goes through it.
#[derive(Default)]
struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not in memory"))
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn ensure_parent(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn given_in_memory_filesystem_when_loading_and_writing_then_disk_untouched() {
    // Arrange
    testing::init_test_setup();
    let fs = Arc::new(MemoryFileSystem::default());
    let input = PathBuf::from("/virtual/menu.json");
    let output = PathBuf::from("/virtual/out/ids.txt");
    fs.write(&input, &menu().to_string()).unwrap();
    let service =
        ServiceContainer::with_deps(Settings::default(), fs.clone()).hierarchy_service();

    // Act
    let set = service.load(&input).unwrap();
    let sorted = service.sort(&set).unwrap();
    let text = service.render(&sorted, OutputFormat::Ids).unwrap();
    service.write_output(&output, &text).unwrap();

    // Assert
    assert!(!output.exists());
    assert_eq!(
        fs.read_to_string(&output).unwrap(),
        "coffee\nespresso\nwater\ntea\nsencha\n"
    );
    assert!(service.load(Path::new("/virtual/absent.json")).is_err());
}

// ============================================================
// Sorting and rendering
// ============================================================

#[rstest]
fn given_menu_file_when_sorting_to_ids_then_branches_precede_children(workspace: TempDir) {
    // Arrange
    let path = write_json(workspace.path(), "menu.json", &menu());
    let service = service(Settings::default());
    let set = service.load(&path).unwrap();

    // Act
    let sorted = service.sort(&set).unwrap();
    let text = service.render(&sorted, OutputFormat::Ids).unwrap();

    // Assert
    assert_eq!(text, "coffee\nespresso\nwater\ntea\nsencha\n");
}

#[rstest]
fn given_sorted_records_when_rendering_ndjson_then_one_record_per_line(workspace: TempDir) {
    let _ = workspace;
    let service = service(Settings::default());
    let set = service.parse(&menu().to_string(), "menu.json").unwrap();
    let sorted = service.sort(&set).unwrap();

    let text = service.render(&sorted, OutputFormat::Ndjson).unwrap();

    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["id"], "coffee");
    assert_eq!(lines[1]["name"], "Espresso");
}

#[rstest]
fn given_pretty_json_output_when_reparsed_then_records_unchanged(workspace: TempDir) {
    let _ = workspace;
    let service = service(Settings::default());
    let set = service.parse(&menu().to_string(), "menu.json").unwrap();
    let sorted = service.sort(&set).unwrap();

    let text = service.render(&sorted, OutputFormat::Json).unwrap();

    let reparsed: Vec<Value> = serde_json::from_str(&text).unwrap();
    let expected: Vec<Value> = sorted.into_iter().cloned().collect();
    assert_eq!(reparsed, expected);
}

#[rstest]
fn given_output_path_in_new_directory_when_writing_then_parents_created(workspace: TempDir) {
    // Arrange
    let service = service(Settings::default());
    let target = workspace.path().join("out").join("sorted.json");

    // Act
    service.write_output(&target, "[]\n").unwrap();

    // Assert
    assert_eq!(fs::read_to_string(&target).unwrap(), "[]\n");
}

#[rstest]
fn given_custom_fields_and_pointer_when_sorting_then_settings_applied(workspace: TempDir) {
    // Arrange
    let document = json!({
        "payload": {
            "rows": [
                {"key": 2, "folder": 0, "up": 1},
                {"key": 1, "folder": 1, "up": null}
            ]
        }
    });
    let path = write_json(workspace.path(), "rows.json", &document);
    let mut settings = Settings {
        records_pointer: Some("/payload/rows".into()),
        ..Default::default()
    };
    settings.collection.id_property = "key".into();
    settings.collection.node_property = "folder".into();
    settings.collection.parent_property = "up".into();
    let service = service(settings);

    // Act
    let set = service.load(&path).unwrap();
    let sorted = service.sort(&set).unwrap();

    // Assert
    let keys: Vec<&Value> = sorted.iter().map(|r| &r["key"]).collect();
    assert_eq!(keys, vec![&json!(1), &json!(2)]);
}

// ============================================================
// Tree
// ============================================================

#[rstest]
fn given_label_property_when_rendering_tree_then_labels_shown(workspace: TempDir) {
    let _ = workspace;
    let mut settings = Settings::default();
    settings.output.label_property = Some("name".into());
    let service = service(settings);
    let set = service.parse(&menu().to_string(), "menu.json").unwrap();

    let rendered = service.tree(&set).unwrap().to_string();

    assert!(rendered.starts_with("menu.json"), "{}", rendered);
    assert!(rendered.contains("\"coffee\"/ Coffee"), "{}", rendered);
    assert!(rendered.contains("\"espresso\" Espresso"), "{}", rendered);
    assert!(rendered.contains("\"water\" Water"), "{}", rendered);
}

#[rstest]
fn given_chain_deeper_than_tree_limit_when_rendering_tree_then_invalid_input(workspace: TempDir) {
    // Arrange
    let _ = workspace;
    let depth = 30_000u64;
    let records: Vec<Value> = (0..depth)
        .map(|i| {
            let parent = if i == 0 { Value::Null } else { json!(i - 1) };
            json!({"id": i, "node": i + 1 < depth, "parent": parent})
        })
        .collect();
    let settings = Settings {
        branch_policy: BranchPolicy::Matching,
        ..Default::default()
    };
    let service = service(settings);
    let set = service
        .parse(&Value::Array(records).to_string(), "chain.json")
        .unwrap();

    // Act
    let err = service.tree(&set).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::InvalidInput { .. }), "{:?}", err);
    assert!(
        err.to_string().contains(&TREE_DEPTH_LIMIT.to_string()),
        "{}",
        err
    );
    assert_eq!(service.sort(&set).unwrap().len(), depth as usize);
}

#[rstest]
fn given_chain_at_tree_limit_when_rendering_tree_then_rendered(workspace: TempDir) {
    let _ = workspace;
    let records: Vec<Value> = (0..TREE_DEPTH_LIMIT as u64)
        .map(|i| {
            let parent = if i == 0 { Value::Null } else { json!(i - 1) };
            json!({"id": i, "node": true, "parent": parent})
        })
        .collect();
    let settings = Settings {
        branch_policy: BranchPolicy::Matching,
        ..Default::default()
    };
    let service = service(settings);
    let set = service
        .parse(&Value::Array(records).to_string(), "chain.json")
        .unwrap();

    let tree = service.tree(&set).unwrap();

    assert_eq!(tree.leaves.len(), 1);
    assert_eq!(tree.leaves[0].root, "0/");
}

// ============================================================
// Check
// ============================================================

#[rstest]
fn given_well_formed_menu_when_checking_then_report_clean(workspace: TempDir) {
    let _ = workspace;
    let service = service(Settings::default());
    let set = service.parse(&menu().to_string(), "menu.json").unwrap();

    let report = service.check(&set).unwrap();

    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.records, 5);
    assert_eq!(report.branches, 2);
    assert_eq!(report.emitted, Some(5));
    assert_eq!(report.depth, Some(2));
}

#[rstest]
fn given_structural_problems_when_checking_then_each_reported(workspace: TempDir) {
    // Arrange
    let _ = workspace;
    let records = json!([
        {"id": 1, "node": true, "parent": null},
        {"id": 1, "node": false, "parent": null},
        {"id": 2, "node": false, "parent": 99}
    ]);
    let service = service(Settings::default());
    let set = service.parse(&records.to_string(), "bad.json").unwrap();

    // Act
    let report = service.check(&set).unwrap();

    // Assert
    assert!(!report.is_clean());
    assert_eq!(report.duplicate_ids, vec!["1".to_string()]);
    assert_eq!(report.orphans, vec!["2".to_string()]);
    assert_eq!(report.unreached, Some(vec!["2".to_string()]));
    assert!(report.missing_fields.is_empty());
    assert!(report.cycle.is_none());
}

#[rstest]
fn given_child_of_leaf_when_checking_then_reported_as_dropped(workspace: TempDir) {
    // Arrange: record 2 points at a leaf, which is never expanded
    let _ = workspace;
    let records = json!([
        {"id": 1, "node": false, "parent": null},
        {"id": 2, "node": false, "parent": 1}
    ]);
    let service = service(Settings::default());
    let set = service.parse(&records.to_string(), "leaf.json").unwrap();

    // Act
    let sorted = service.sort(&set).unwrap();
    let report = service.check(&set).unwrap();

    // Assert
    assert_eq!(sorted.len(), 1);
    assert_eq!(report.emitted, Some(1));
    assert_eq!(report.orphans, vec!["2".to_string()]);
    assert_eq!(report.unreached, Some(vec!["2".to_string()]));
    assert!(!report.is_clean());
}

#[rstest]
fn given_misnamed_field_when_checking_then_missing_field_reported(workspace: TempDir) {
    let _ = workspace;
    let mut settings = Settings::default();
    settings.collection.node_property = "isFolder".into();
    let service = service(settings);
    let set = service.parse(&menu().to_string(), "menu.json").unwrap();

    let report = service.check(&set).unwrap();

    assert_eq!(report.missing_fields, vec!["isFolder".to_string()]);
}

#[rstest]
#[case(BranchPolicy::Always)]
#[case(BranchPolicy::Matching)]
fn given_cycle_when_checking_then_reported_not_raised(
    workspace: TempDir,
    #[case] policy: BranchPolicy,
) {
    // Arrange
    let _ = workspace;
    let records = json!([
        {"id": "root", "node": true, "parent": null},
        {"id": "a", "node": true, "parent": "b"},
        {"id": "b", "node": true, "parent": "a"}
    ]);
    let settings = Settings {
        branch_policy: policy,
        ..Default::default()
    };
    let service = service(settings);
    let set = service.parse(&records.to_string(), "loop.json").unwrap();

    // Act
    let report = service.check(&set).unwrap();

    // Assert
    match policy {
        // "a" is a branch seen by the top-level scan, so the loop is walked
        BranchPolicy::Always => {
            assert!(report.cycle.is_some(), "{:?}", report);
            assert!(report.emitted.is_none());
        }
        // Neither "a" nor "b" is reachable from the top level
        BranchPolicy::Matching => {
            assert!(report.cycle.is_none(), "{:?}", report);
            assert_eq!(report.emitted, Some(1));
            assert_eq!(
                report.unreached,
                Some(vec!["\"a\"".to_string(), "\"b\"".to_string()])
            );
            assert!(!report.is_clean());
        }
    }
}
