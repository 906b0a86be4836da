//! Records through the wire format

use crate::*;
use proptest::prelude::*;

#[test]
fn test_record_roundtrip_between_stores() {
    let source = create_store();
    source.insert(committed(&source, 8)).unwrap();
    for i in 0..20i64 {
        source
            .add_undo_action(TxId::new(8), action(i * 3 + 2, i * 3 + 1))
            .unwrap();
    }
    let bytes = source.serialize_tx_data(TxId::new(8)).unwrap();

    let target = create_store();
    assert_eq!(target.load_tx_data(&bytes).unwrap(), TxId::new(8));

    let lhs = source.table().get(TxId::new(8)).unwrap();
    let rhs = target.table().get(TxId::new(8)).unwrap();
    assert!(lhs.tx_data().equals(rhs.tx_data()));
    assert_eq!(
        lhs.undo_status_list().node_sizes(),
        rhs.undo_status_list().node_sizes()
    );
}

#[test]
fn test_aborted_record_roundtrip() {
    let store = create_store();
    let mut tx_data = store.begin(TxId::new(2));
    tx_data.set_scn_range(Scn::new(5), Scn::new(6)).unwrap();
    tx_data.abort().unwrap();
    store.insert(tx_data).unwrap();

    let bytes = store.serialize_tx_data(TxId::new(2)).unwrap();
    let other = create_store();
    other.load_tx_data(&bytes).unwrap();
    let commit = other.commit_data(TxId::new(2)).unwrap();
    assert_eq!(commit.state, TxState::Abort);
    assert!(!commit.commit_version.is_valid());
}

#[test]
fn test_future_version_rejected() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();
    let mut bytes = store.serialize_tx_data(TxId::new(1)).unwrap();
    bytes[0] = 0x02;

    let other = create_store();
    let err = other.load_tx_data(&bytes).unwrap_err();
    assert!(matches!(err, txdata::Error::Corruption(_)));
    assert!(other.is_empty());
    assert_eq!(other.slab_stats().in_use, 0);
}

#[test]
fn test_truncated_record_rejected() {
    let store = create_store();
    store.insert(committed(&store, 1)).unwrap();
    store.add_undo_action(TxId::new(1), action(9, 3)).unwrap();
    let bytes = store.serialize_tx_data(TxId::new(1)).unwrap();

    let other = create_store();
    for len in 0..bytes.len() {
        let err = other.load_tx_data(&bytes[..len]).unwrap_err();
        assert!(matches!(err, txdata::Error::Corruption(_)), "len {}: {}", len, err);
    }
    assert_eq!(other.slab_stats().in_use, 0);
}

#[test]
fn test_record_dump() {
    let store = create_store();
    store.insert(committed(&store, 4)).unwrap();
    store.add_undo_action(TxId::new(4), action(12, 7)).unwrap();

    let mut out = Vec::new();
    store.dump_tx_data(TxId::new(4), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("TX_ID=4"));
    assert!(text.contains("{from:12, to:7}"));
}

fn action_strategy() -> impl Strategy<Value = UndoAction> {
    (0i64..2000, 1i64..50).prop_map(|(to, len)| action(to + len, to))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_record_roundtrip(actions in prop::collection::vec(action_strategy(), 0..80)) {
        let store = create_store();
        let tx_data = committed(&store, 1);
        for a in &actions {
            tx_data.add_undo_action(*a, None).unwrap();
        }
        let bytes = tx_data.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), tx_data.get_serialize_size());

        let mut copy = store.begin(TxId::INVALID);
        copy.deserialize(&mut Reader::new(&bytes)).unwrap();
        prop_assert!(copy.equals(&tx_data));
        prop_assert_eq!(
            copy.undo_status_list().node_actions(),
            tx_data.undo_status_list().node_actions()
        );
    }
}
