//! # txdata
//!
//! In-memory transaction version records with savepoint rollback history.
//!
//! A version store keeps, for every transaction, its commit outcome
//! ([`TxCommitData`]) and the sequence-number ranges it rolled back
//! ([`UndoStatusList`]). Readers use it to decide whether a given statement of
//! a given transaction is visible.
//!
//! ## Quick Start
//!
//! ```
//! use txdata::prelude::*;
//!
//! let store = TxDataStore::open(TxDataConfig::default())?;
//!
//! let mut tx_data = store.begin(TxId::new(42));
//! tx_data.set_scn_range(Scn::new(100), Scn::new(180))?;
//! tx_data.commit(Scn::new(200), false)?;
//! store.insert(tx_data)?;
//!
//! // Statements 11..=20 were rolled back to savepoint 10
//! store.add_undo_action(TxId::new(42), UndoAction::new(20, 10)?)?;
//! assert!(store.is_sequence_undone(TxId::new(42), 15)?);
//! assert!(!store.is_sequence_undone(TxId::new(42), 10)?);
//! # Ok::<(), txdata::Error>(())
//! ```
//!
//! ## Crates
//!
//! - `txdata-core` - identifiers, undo actions, codec, errors, configuration
//! - `txdata-storage` - slab, undo status lists, records, version store table
//! - `txdata-concurrency` - memtable write references and write guards

#![warn(missing_docs)]

mod error;
mod store;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use store::{TxDataStore, TxDataStoreBuilder};

// Re-export types
pub use txdata_concurrency::{MemtableWriteGuard, TxDataMemtableMgr};
pub use txdata_core::{Scn, SequenceNo, TxDataConfig, TxId, TxState, UndoAction};
pub use txdata_storage::{SliceSlab, TxCommitData, TxData, TxDataTable, UndoStatusList};
