//! Version store placement, removal and memtable pinning

use crate::*;
use std::sync::Arc;
use txdata::{MemtableWriteGuard, SliceSlab};

#[test]
fn test_insert_marks_placement() {
    let store = create_store();
    let tx_data = committed(&store, 1);
    assert!(!tx_data.in_version_store);
    store.insert(tx_data).unwrap();
    assert!(store.commit_data(TxId::new(1)).is_ok());
    assert!(store.table().get(TxId::new(1)).unwrap().in_version_store);
}

#[test]
fn test_duplicate_insert_rejected() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();
    let err = store.insert(committed(&store, 1)).unwrap_err();
    assert!(matches!(err, txdata::Error::InvalidArgument(_)));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_remove_returns_every_slot() {
    let store = create_store();
    for id in 0..5 {
        store.insert(committed(&store, id)).unwrap();
        for i in 0..(id * 5) {
            store
                .add_undo_action(TxId::new(id), action(i * 10 + 5, i * 10))
                .unwrap();
        }
    }
    assert!(store.slab_stats().in_use > 5);

    for id in 0..5 {
        assert!(store.remove(TxId::new(id)));
    }
    let stats = store.slab_stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.rejected_frees, 0);
    assert_eq!(stats.total_allocs, stats.total_frees);
}

#[test]
fn test_exhausted_slab_is_retryable() {
    init_tracing();
    let store = TxDataStore::builder().slab_capacity(2).build().unwrap();
    store.insert(committed(&store, 1)).unwrap();
    store.add_undo_action(TxId::new(1), action(5, 0)).unwrap();

    let err = store.insert(committed(&store, 2)).unwrap_err();
    assert!(err.is_retryable());

    // Free room and retry
    assert!(store.remove(TxId::new(1)));
    store.insert(committed(&store, 2)).unwrap();
}

#[test]
fn test_failed_append_leaves_history_unchanged() {
    init_tracing();
    let store = TxDataStore::builder().slab_capacity(2).build().unwrap();
    store.insert(committed(&store, 1)).unwrap();
    for i in 0..7i64 {
        store
            .add_undo_action(TxId::new(1), action(i * 10 + 5, i * 10))
            .unwrap();
    }
    let before = store
        .table()
        .get(TxId::new(1))
        .unwrap()
        .undo_status_list()
        .node_actions();

    let err = store
        .add_undo_action(TxId::new(1), action(505, 500))
        .unwrap_err();
    assert!(err.is_retryable());
    let after = store
        .table()
        .get(TxId::new(1))
        .unwrap()
        .undo_status_list()
        .node_actions();
    assert_eq!(before, after);
    assert!(!store.is_sequence_undone(TxId::new(1), 503).unwrap());
}

#[test]
fn test_shared_slab_between_stores() {
    init_tracing();
    let slab = SliceSlab::shared(None);
    let a = TxDataStore::builder().slab(Arc::clone(&slab)).build().unwrap();
    let b = TxDataStore::builder().slab(Arc::clone(&slab)).build().unwrap();
    a.insert(committed(&a, 1)).unwrap();
    b.insert(committed(&b, 1)).unwrap();
    assert_eq!(slab.stats().in_use, 2);
    drop(a);
    assert_eq!(slab.stats().in_use, 1);
}

#[test]
fn test_freeze_waits_for_writers() {
    let store = create_store();
    let mut guard = MemtableWriteGuard::new();
    store
        .memtables()
        .get_all_memtables_for_write(&mut guard)
        .unwrap();

    store.freeze().unwrap();
    store.insert(committed(&store, 1)).unwrap();
    assert_eq!(store.release_frozen(), 0);

    drop(guard);
    assert_eq!(store.release_frozen(), 1);
    assert_eq!(store.memtables().memtable_count(), 1);
}
