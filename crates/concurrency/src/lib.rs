//! Concurrency layer for txdata
//!
//! This crate pins the memtables a transaction writes into:
//! - TxDataMemtable: write-reference counting and frozen flag
//! - MemtableWriteGuard: bundle of held handles, released exactly once
//! - TxDataMemtableMgr: active/frozen memtable list handing out guards

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod memtable;
pub mod write_guard;

pub use manager::TxDataMemtableMgr;
pub use memtable::{TxDataMemtable, TxDataMemtableHandle};
pub use write_guard::{MemtableWriteGuard, MAX_TX_DATA_MEMTABLE_CNT};
