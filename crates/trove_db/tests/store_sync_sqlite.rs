//! Store sync applied against a real SQLite table through `BlockingStore`.

use std::fs;
use tempfile::TempDir;
use trove_core::reconcile::plan_sync;
use trove_core::{extract, scan, RecordStore, SyncOp};
use trove_db::{BlockingStore, DbError, TableName};

fn observe(root: &std::path::Path) -> Vec<trove_core::FileRecord> {
    let outcome = scan(root).unwrap();
    outcome.paths.iter().map(|p| extract(p).unwrap()).collect()
}

fn apply(store: &mut BlockingStore, ops: Vec<SyncOp>) {
    for op in ops {
        match op {
            SyncOp::Insert(record) => {
                store.insert(&record).unwrap();
            }
            SyncOp::Update(update) => store.update(update.id, &update.record).unwrap(),
            SyncOp::Delete { path } => {
                assert!(store.delete(&path).unwrap());
            }
        }
    }
}

#[test]
fn test_sync_round_trip_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("data");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), "hi").unwrap();
    fs::write(root.join("sub/b.txt"), "bye").unwrap();

    let mut store = BlockingStore::open(tmp.path().join("db/trove.sqlite3"), TableName::parse("imagenes").unwrap()).unwrap();

    let observed = observe(&root);
    let plan = plan_sync(&observed, &store.load_by_path().unwrap());
    assert_eq!(plan.inserts.len(), 2);
    apply(&mut store, plan.into_operations());

    let second = plan_sync(&observe(&root), &store.load_by_path().unwrap());
    assert!(second.is_empty(), "{second:?}");

    // Change one file, remove the other
    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::remove_file(root.join("sub/b.txt")).unwrap();

    let third = plan_sync(&observe(&root), &store.load_by_path().unwrap());
    assert_eq!(third.updates.len(), 1);
    assert_eq!(third.deletes.len(), 1);
    apply(&mut store, third.into_operations());

    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].file.content_hash, "5d41402abc4b2a76b9719d911017c592");
    assert_eq!(all[0].file.size, 5);

    store.close();
}

#[test]
fn test_open_existing_requires_file() {
    let tmp = TempDir::new().unwrap();
    let result = BlockingStore::open_existing(tmp.path().join("missing.sqlite3"), TableName::parse("t").unwrap());
    assert!(matches!(result, Err(DbError::NotFound(_))));
}

#[test]
fn test_in_memory_store() {
    let mut store = BlockingStore::open_in_memory(TableName::parse("t").unwrap()).unwrap();
    assert!(store.list_all().unwrap().is_empty());
    assert!(!store.delete("/nothing").unwrap());
}
