use lddb_core::{RecordRepository, Storage, StorageConfig, StorageError, StoreRequest};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use std::sync::Barrier;

fn install_poison_trigger(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_poison BEFORE INSERT ON lddb
         WHEN json_extract(NEW.data, '$.poison') IS NOT NULL
         BEGIN
             SELECT RAISE(ABORT, 'poisoned document');
         END;",
    )
    .unwrap();
}

#[test]
fn bulk_store_with_invalid_item_persists_nothing() {
    let mut store = Storage::open_in_memory(StorageConfig::default()).unwrap();
    let items = vec![
        StoreRequest::new("/work/1", json!({"title": "one"})),
        StoreRequest::new("/work/2", json!({"title": "two"})),
        StoreRequest::new("", json!({"title": "three"})),
        StoreRequest::new("/work/4", json!({"title": "four"})),
        StoreRequest::new("/work/5", json!({"title": "five"})),
    ];

    let err = store.bulk_store(items).unwrap_err();
    assert!(matches!(err, StorageError::InvalidIdentifier(_)));

    for id in ["/work/1", "/work/2", "/work/4", "/work/5"] {
        assert!(!store.get_record_status(id).unwrap().exists);
        assert!(store.get_all_versions(id).unwrap().is_empty());
    }
}

#[test]
fn bulk_store_counts_only_new_content() {
    let mut store = Storage::open_in_memory(StorageConfig::default()).unwrap();
    store.store("/work/1", json!({"title": "one"}), None).unwrap();

    let new_items = store
        .bulk_store(vec![
            StoreRequest::new("/work/1", json!({"title": "one"})),
            StoreRequest::new("/work/2", json!({"title": "two"})),
            StoreRequest::new("/work/2", json!({"title": "two"})),
            StoreRequest::new("/work/3", json!({"title": "three"})),
        ])
        .unwrap();

    assert_eq!(new_items, 2);
    assert_eq!(store.get_all_versions("/work/2").unwrap().len(), 1);
    assert!(store.get_record_status("/work/3").unwrap().exists);
    assert_eq!(store.bulk_store(Vec::new()).unwrap(), 0);
}

#[test]
fn failed_current_state_write_leaves_no_version_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lddb.db");
    let mut store = Storage::open(&path, StorageConfig::default()).unwrap();
    install_poison_trigger(&path);

    let err = store
        .store("/work/1", json!({"title": "A", "poison": true}), None)
        .unwrap_err();
    assert!(matches!(err, StorageError::Db(_)));

    assert!(store.get_record("/work/1").unwrap().is_none());
    assert!(store.get_all_versions("/work/1").unwrap().is_empty());
}

#[test]
fn session_is_reusable_after_a_failed_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lddb.db");
    let mut store = Storage::open(&path, StorageConfig::default()).unwrap();
    install_poison_trigger(&path);

    store
        .store("/work/1", json!({"poison": 1}), None)
        .unwrap_err();
    store
        .bulk_store(vec![
            StoreRequest::new("/work/2", json!({"title": "ok"})),
            StoreRequest::new("/work/3", json!({"poison": 2})),
        ])
        .unwrap_err();
    assert!(!store.get_record_status("/work/2").unwrap().exists);

    let stored = store.store("/work/1", json!({"title": "A"}), None).unwrap();
    assert_eq!(stored.data, json!({"title": "A"}));
    assert_eq!(store.get_all_versions("/work/1").unwrap().len(), 1);
}

#[test]
fn concurrent_identical_writes_record_one_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lddb.db");
    let stores = vec![
        Storage::open(&path, StorageConfig::default()).unwrap(),
        Storage::open(&path, StorageConfig::default()).unwrap(),
    ];
    let barrier = Barrier::new(stores.len());

    std::thread::scope(|scope| {
        for mut store in stores {
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                store
                    .store("/work/1", json!({"title": "same"}), None)
                    .unwrap();
            });
        }
    });

    let store = Storage::open(&path, StorageConfig::default()).unwrap();
    assert_eq!(store.get_all_versions("/work/1").unwrap().len(), 1);
    assert!(store.get_record_status("/work/1").unwrap().exists);
}
