//! Undo history compaction through a stored record

use crate::*;

// =============================================================================
// COMPACTION
// =============================================================================

#[test]
fn test_nested_rollbacks_collapse() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();

    store.add_undo_action(TxId::new(1), action(50, 40)).unwrap();
    store.add_undo_action(TxId::new(1), action(45, 42)).unwrap();
    store.add_undo_action(TxId::new(1), action(60, 30)).unwrap();

    let node = store.table().get(TxId::new(1)).unwrap();
    let list = node.undo_status_list();
    assert_eq!(list.actions_oldest_first(), vec![action(60, 30)]);
    assert_eq!(list.node_count(), 1);
}

#[test]
fn test_savepoint_chain_collapses() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();

    store.add_undo_action(TxId::new(1), action(10, 0)).unwrap();
    store.add_undo_action(TxId::new(1), action(20, 10)).unwrap();
    store.add_undo_action(TxId::new(1), action(25, 20)).unwrap();

    let node = store.table().get(TxId::new(1)).unwrap();
    assert_eq!(
        node.undo_status_list().actions_oldest_first(),
        vec![action(25, 0)]
    );
}

#[test]
fn test_gap_between_rollbacks_is_kept() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();

    store.add_undo_action(TxId::new(1), action(10, 0)).unwrap();
    store.add_undo_action(TxId::new(1), action(20, 15)).unwrap();
    store.add_undo_action(TxId::new(1), action(25, 20)).unwrap();

    for seq in [1, 10, 16, 25] {
        assert!(store.is_sequence_undone(TxId::new(1), seq).unwrap(), "seq {}", seq);
    }
    for seq in [0, 11, 15, 26] {
        assert!(!store.is_sequence_undone(TxId::new(1), seq).unwrap(), "seq {}", seq);
    }
}

#[test]
fn test_many_disjoint_rollbacks_span_nodes() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();
    for i in 0..50i64 {
        store
            .add_undo_action(TxId::new(1), action(i * 4 + 2, i * 4))
            .unwrap();
    }

    let node = store.table().get(TxId::new(1)).unwrap();
    let sizes = node.undo_status_list().node_sizes();
    assert_eq!(sizes.len(), 8);
    assert_eq!(sizes[0], 1);
    assert!(sizes[1..].iter().all(|&s| s == 7));
    drop(node);

    // One record slot plus eight undo nodes
    assert_eq!(store.slab_stats().in_use, 9);
}

// =============================================================================
// VALIDITY
// =============================================================================

#[test]
fn test_running_record_becomes_valid_after_first_rollback() {
    let store = create_store();
    let mut tx_data = store.begin(TxId::new(3));
    tx_data.set_scn_range(Scn::INVALID, Scn::new(77)).unwrap();
    assert!(!tx_data.is_valid_in_store());

    tx_data.add_undo_action(action(5, 1), None).unwrap();
    assert!(tx_data.is_valid_in_store());
    store.insert(tx_data).unwrap();
    assert_eq!(
        store.commit_data(TxId::new(3)).unwrap().state,
        TxState::Running
    );
}

#[test]
fn test_overflow_keeps_the_action() {
    init_tracing();
    let store = TxDataStore::builder()
        .slice_size(128)
        .max_tx_serialize_size(128 * 2)
        .build()
        .unwrap();
    store.insert(committed(&store, 1)).unwrap();

    let mut overflowed = None;
    for i in 0..15i64 {
        if let Err(e) = store.add_undo_action(TxId::new(1), action(i * 10 + 5, i * 10)) {
            overflowed = Some((i, e));
            break;
        }
    }
    let (i, err) = overflowed.expect("history should overflow");
    assert_eq!(i, 14);
    assert!(err.is_overflow());
    assert!(store.is_sequence_undone(TxId::new(1), 143).unwrap());
}
