//! Storage layer for txdata
//!
//! This crate implements the in-memory transaction version records:
//! - SliceSlab: shared, generation-checked slab allocator
//! - UndoNode / UndoStatusList: compacting chain of rolled-back intervals
//! - TxCommitData / TxData: commit outcome plus undo history, with wire format
//! - TxDataAllocHandle: record and index node share one slab slot
//! - TxDataTable: concurrent version store keyed by transaction id

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alloc;
pub mod slab;
pub mod table;
pub mod tx_data;
pub mod undo_node;
pub mod undo_status;

pub use alloc::{TxDataAllocHandle, TxDataHashNode};
pub use slab::{RawSlot, SlabAllocator, SlabSlot, SlabStats, SliceSlab};
pub use table::TxDataTable;
pub use tx_data::{TxCommitData, TxData};
pub use undo_node::{UndoNode, UNDO_ACTIONS_PER_NODE};
pub use undo_status::UndoStatusList;
