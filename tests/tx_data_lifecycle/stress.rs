//! Concurrent rollbacks and readers against one store

use crate::*;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const WRITERS: i64 = 4;
const ACTIONS_PER_WRITER: usize = 300;

#[test]
fn test_concurrent_rollbacks_never_lose_coverage() {
    let store = Arc::new(create_store());
    for id in 0..WRITERS {
        store.insert(committed(&store, id)).unwrap();
    }

    let applied = Arc::new(Mutex::new(Vec::new()));
    let writers: Vec<_> = (0..WRITERS)
        .map(|id| {
            let store = Arc::clone(&store);
            let applied = Arc::clone(&applied);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(id as u64);
                for _ in 0..ACTIONS_PER_WRITER {
                    let to = rng.gen_range(0..10_000i64);
                    let len = rng.gen_range(1..20i64);
                    let a = action(to + len, to);
                    store.add_undo_action(TxId::new(id), a).unwrap();
                    applied.lock().push((id, a));
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(99);
                for _ in 0..2000 {
                    let id = rng.gen_range(0..WRITERS);
                    let seq = rng.gen_range(0..10_020i64);
                    store.is_sequence_undone(TxId::new(id), seq).unwrap();
                }
            })
        })
        .collect();

    for h in writers.into_iter().chain(readers) {
        h.join().unwrap();
    }

    for (id, a) in applied.lock().iter() {
        assert!(store.is_sequence_undone(TxId::new(*id), a.undo_from).unwrap());
        assert!(store.is_sequence_undone(TxId::new(*id), a.undo_to + 1).unwrap());
    }

    // Every slot in use is a record or one of its undo nodes
    let nodes: usize = (0..WRITERS)
        .map(|id| {
            store
                .table()
                .get(TxId::new(id))
                .unwrap()
                .undo_status_list()
                .node_count()
        })
        .sum();
    assert_eq!(store.slab_stats().in_use, WRITERS as usize + nodes);
}

#[test]
fn test_concurrent_serialize_during_appends() {
    let store = Arc::new(create_store());
    store.insert(committed(&store, 1)).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut i = 0i64;
            while !done.load(Ordering::Relaxed) {
                if i % 30 == 0 {
                    store.table().get(TxId::new(1)).unwrap().undo_status_list().reset();
                }
                store
                    .add_undo_action(TxId::new(1), action(i * 10 + 5, i * 10))
                    .unwrap();
                i += 1;
            }
        })
    };

    let other = create_store();
    let mut failures = 0;
    for _ in 0..5_000 {
        let loaded = store.serialize_tx_data(TxId::new(1)).and_then(|bytes| {
            other.remove(TxId::new(1));
            other.load_tx_data(&bytes)
        });
        if loaded.is_err() {
            failures += 1;
        }
    }
    done.store(true, Ordering::Relaxed);
    writer.join().unwrap();
    assert_eq!(failures, 0);
}
