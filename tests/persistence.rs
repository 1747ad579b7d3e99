//! Persistence Integration Tests
//!
//! Save/load, validation, backup round trips and bulk operations against
//! the in-memory and file backends.

use readshelf::storage::{
    FileBackend, ImportOptions, MemoryBackend, PersistenceService, SaveOptions, StorageBackend,
    StorageError,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn service() -> PersistenceService<MemoryBackend> {
    PersistenceService::new(MemoryBackend::new())
}

#[test]
fn test_save_then_load_returns_value() {
    let store = service();
    let value = json!({"reading": [{"id": "OL1W", "title": "Dune"}], "toRead": [], "completed": []});

    store.save("readingLists", &value, SaveOptions::default()).unwrap();
    let loaded = store.load("readingLists", Value::Null).unwrap();

    assert_eq!(loaded.data, value);
    assert!(loaded.timestamp.is_some());
}

#[test]
fn test_load_missing_key_returns_default() {
    let store = service();
    let loaded = store.load("notes", vec!["fallback".to_string()]).unwrap();

    assert_eq!(loaded.data, vec!["fallback".to_string()]);
    assert_eq!(loaded.timestamp, None);
}

#[test]
fn test_invalid_save_leaves_previous_value() {
    let store = service();
    let good = json!({"reading": [], "toRead": [], "completed": []});
    store.save("readingLists", &good, SaveOptions::default()).unwrap();

    let err = store
        .save("readingLists", &json!({"reading": "not a list"}), SaveOptions::default())
        .unwrap_err();
    assert!(matches!(err, StorageError::ValidationFailed { .. }));
    assert_eq!(err.code(), "VALIDATION_FAILED");

    assert_eq!(store.load("readingLists", Value::Null).unwrap().data, good);
}

#[test]
fn test_validation_can_be_skipped() {
    let store = service();
    let options = SaveOptions { validate: false };

    store.save("preferences", &json!({"theme": "neon"}), options).unwrap();
    assert_eq!(
        store.load("preferences", Value::Null).unwrap().data,
        json!({"theme": "neon"})
    );
}

#[test]
fn test_legacy_raw_value_loads() {
    let store = service();
    store
        .backend()
        .set("readshelf_searchHistory", r#"["dune","hobbit"]"#)
        .unwrap();

    let loaded = store.load("searchHistory", Vec::<String>::new()).unwrap();
    assert_eq!(loaded.data, vec!["dune".to_string(), "hobbit".to_string()]);
    assert_eq!(loaded.timestamp, None);
}

#[test]
fn test_malformed_stored_json_is_parse_error() {
    let store = service();
    store.backend().set("readshelf_preferences", "{oops").unwrap();

    let err = store.load("preferences", Value::Null).unwrap_err();
    assert_eq!(err.code(), "PARSE_ERROR");
}

#[test]
fn test_export_clear_import_round_trip() {
    let store = service();
    store
        .save("readingLists", &json!({"reading": [], "toRead": [{"id": "a"}], "completed": []}), SaveOptions::default())
        .unwrap();
    store.save("searchHistory", &json!(["dune"]), SaveOptions::default()).unwrap();
    store.save("notes", &json!({"free": "form"}), SaveOptions::default()).unwrap();

    let before: Vec<Value> = ["readingLists", "searchHistory", "notes"]
        .iter()
        .map(|k| store.load(k, Value::Null).unwrap().data)
        .collect();

    let backup = store.export_all().unwrap();
    let doc: Value = serde_json::from_str(&backup).unwrap();
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["app"], "readshelf");
    assert!(doc["exportedAt"].is_string());

    store.clear_all().unwrap();
    assert!(store.keys().unwrap().is_empty());

    let report = store.import_all(&backup, ImportOptions::default()).unwrap();
    assert_eq!(report.imported.len(), 3);
    assert!(report.warnings.is_empty());

    let after: Vec<Value> = ["readingLists", "searchHistory", "notes"]
        .iter()
        .map(|k| store.load(k, Value::Null).unwrap().data)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_merge_import_shallow_merges_objects() {
    let store = service();
    store.save("settings", &json!({"a": 1, "b": 2}), SaveOptions::default()).unwrap();

    let options = ImportOptions {
        merge: true,
        validate: true,
    };
    store.import_all(r#"{"settings": {"b": 3, "c": 4}}"#, options).unwrap();

    assert_eq!(
        store.load("settings", Value::Null).unwrap().data,
        json!({"a": 1, "b": 3, "c": 4})
    );
}

#[test]
fn test_merge_import_dedups_arrays_by_id() {
    let store = service();
    store
        .save("shelf", &json!([{"id": "a", "v": 1}, {"id": "b", "v": 1}]), SaveOptions::default())
        .unwrap();

    let options = ImportOptions {
        merge: true,
        validate: true,
    };
    store
        .import_all(r#"{"shelf": [{"id": "b", "v": 2}, {"id": "c", "v": 2}]}"#, options)
        .unwrap();

    assert_eq!(
        store.load("shelf", Value::Null).unwrap().data,
        json!([{"id": "a", "v": 1}, {"id": "b", "v": 2}, {"id": "c", "v": 2}])
    );
}

#[test]
fn test_merge_import_revalidates_merged_value() {
    let store = service();
    let first: Vec<String> = (0..40).map(|i| format!("first {}", i)).collect();
    let second: Vec<String> = (0..40).map(|i| format!("second {}", i)).collect();

    store
        .import_all(&json!({"searchHistory": first}).to_string(), ImportOptions::default())
        .unwrap();

    let options = ImportOptions {
        merge: true,
        validate: true,
    };
    let doc = json!({"searchHistory": second, "notes": "kept"}).to_string();
    let report = store.import_all(&doc, options).unwrap();

    assert_eq!(report.imported, vec!["notes".to_string()]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("searchHistory"));

    let history = store.load("searchHistory", Vec::<String>::new()).unwrap().data;
    assert_eq!(history, first);
}

#[test]
fn test_import_skips_invalid_keys_with_warning() {
    let store = service();
    let json = r#"{"preferences": {"theme": "neon"}, "searchHistory": ["dune"]}"#;

    let report = store.import_all(json, ImportOptions::default()).unwrap();
    assert_eq!(report.imported, vec!["searchHistory".to_string()]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("preferences"));
}

#[test]
fn test_import_rejected_when_nothing_valid() {
    let store = service();
    let err = store
        .import_all(r#"{"preferences": {"theme": "neon"}}"#, ImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, StorageError::ImportRejected { .. }));
}

#[test]
fn test_import_rejects_non_object() {
    let store = service();
    let err = store.import_all("[1, 2]", ImportOptions::default()).unwrap_err();
    assert_eq!(err.code(), "PARSE_ERROR");
}

#[test]
fn test_clear_all_leaves_foreign_keys() {
    let store = service();
    store.save("notes", &json!("mine"), SaveOptions::default()).unwrap();
    store.backend().set("otherapp_session", "keep me").unwrap();

    store.clear_all().unwrap();

    assert_eq!(
        store.backend().get("otherapp_session").unwrap().as_deref(),
        Some("keep me")
    );
    assert!(store.backend().get("readshelf_notes").unwrap().is_none());
}

#[test]
fn test_quota_exceeded_is_distinguished() {
    let store = PersistenceService::new(MemoryBackend::with_capacity(256));
    let big = "x".repeat(512);

    let err = store.save("notes", &big, SaveOptions::default()).unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { ref key } if key == "notes"));
    assert_eq!(err.code(), "QUOTA_EXCEEDED");
}

#[test]
fn test_unavailable_backend() {
    let store = service();
    store.backend().set_disabled(true);

    assert!(!store.is_available());
    let err = store.save("notes", &json!(1), SaveOptions::default()).unwrap_err();
    assert!(matches!(err, StorageError::Unavailable));
}

#[test]
fn test_stats_reports_usage() {
    let store = PersistenceService::new(MemoryBackend::new()).with_capacity(10_000);
    store.save("notes", &json!("hello"), SaveOptions::default()).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.items, 1);
    assert_eq!(stats.total, 10_000);
    assert!(stats.used > 0);
    assert!(stats.percentage > 0.0 && stats.percentage < 100.0);
}

#[test]
fn test_custom_prefix_isolates_services() {
    let a = PersistenceService::new(MemoryBackend::new()).with_prefix("a_");
    a.save("notes", &json!(1), SaveOptions::default()).unwrap();

    assert_eq!(a.keys().unwrap(), vec!["notes".to_string()]);
    assert!(a.backend().get("a_notes").unwrap().is_some());
}

#[test]
fn test_file_backend_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("library.json");

    {
        let store = PersistenceService::new(FileBackend::new(&path));
        store.save("searchHistory", &json!(["dune"]), SaveOptions::default()).unwrap();
    }

    let reopened = PersistenceService::new(FileBackend::new(&path));
    assert_eq!(
        reopened.load("searchHistory", Value::Null).unwrap().data,
        json!(["dune"])
    );
}
