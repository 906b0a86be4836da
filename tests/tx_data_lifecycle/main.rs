//! Transaction Record Lifecycle Test Suite
//!
//! End-to-end tests through the public API: records are created, committed or
//! aborted, collect undo actions, travel through the wire format, and are
//! freed back to the slab.
//!
//! ## Key Verification Points
//!
//! 1. Rolled-back sequence numbers stay rolled back after compaction
//! 2. Serialized records decode to identical topology
//! 3. Failed decodes and failed allocations change nothing
//! 4. Every slab slot and memtable write reference is given back
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test tx_data_lifecycle
//! cargo test --test tx_data_lifecycle wire_format::
//! ```

use txdata::prelude::*;

// Test modules
pub mod stress;
pub mod undo_history;
pub mod version_store;
pub mod wire_format;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Store with default configuration
pub fn create_store() -> TxDataStore {
    init_tracing();
    TxDataStore::open(TxDataConfig::default()).expect("failed to open store")
}

/// Well-formed action covering `(to, from]`
pub fn action(from: i64, to: i64) -> UndoAction {
    UndoAction::new(from, to).expect("malformed test action")
}

/// Committed record ready for insertion
pub fn committed(store: &TxDataStore, id: i64) -> TxData {
    let mut tx_data = store.begin(TxId::new(id));
    tx_data
        .set_scn_range(Scn::new(1000), Scn::new(1100))
        .expect("scn range");
    tx_data.commit(Scn::new(1200), false).expect("commit");
    tx_data
}
