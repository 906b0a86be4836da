//! Allocation adapter between transaction records and the slab
//!
//! A record placed in the version store costs one slab slot for the record
//! itself and its hash-index linkage, plus one slot per undo node. Freeing has
//! to release the undo chain before the record slot; [`TxDataHashNode`]'s
//! field order makes a plain drop do the same.

use crate::slab::{SlabAllocator, SlabSlot, SlabStats};
use crate::tx_data::TxData;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use txdata_core::{Result, TxId, UndoLimits};

/// A record together with the slot backing its hash-index entry
pub struct TxDataHashNode {
    // Dropped first: returns every undo node to the slab
    tx_data: TxData,
    // Dropped last
    slot: SlabSlot,
}

impl TxDataHashNode {
    /// The record
    pub fn tx_data(&self) -> &TxData {
        &self.tx_data
    }

    /// The record, mutably
    pub fn tx_data_mut(&mut self) -> &mut TxData {
        &mut self.tx_data
    }

    /// Slot backing the record
    pub fn slot(&self) -> &SlabSlot {
        &self.slot
    }

    /// Unwrap the record, returning the slot
    pub fn into_tx_data(self) -> TxData {
        let TxDataHashNode { tx_data, slot } = self;
        drop(slot);
        tx_data
    }
}

impl Deref for TxDataHashNode {
    type Target = TxData;

    fn deref(&self) -> &TxData {
        &self.tx_data
    }
}

impl DerefMut for TxDataHashNode {
    fn deref_mut(&mut self) -> &mut TxData {
        &mut self.tx_data
    }
}

impl fmt::Debug for TxDataHashNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxDataHashNode")
            .field("tx_id", &self.tx_data.tx_id)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Hands out records and hash nodes from one shared slab
#[derive(Debug, Clone)]
pub struct TxDataAllocHandle {
    slab: Arc<dyn SlabAllocator>,
    limits: UndoLimits,
}

impl TxDataAllocHandle {
    /// Adapter over `slab`; new records enforce `limits`
    pub fn new(slab: Arc<dyn SlabAllocator>, limits: UndoLimits) -> Self {
        Self { slab, limits }
    }

    /// Shared slab
    pub fn slab(&self) -> &Arc<dyn SlabAllocator> {
        &self.slab
    }

    /// A running record for `tx_id` drawing undo nodes from this slab
    pub fn new_tx_data(&self, tx_id: TxId) -> TxData {
        TxData::new(tx_id, Arc::clone(&self.slab), self.limits)
    }

    /// Place `tx_data` in a freshly allocated hash node
    pub fn alloc_node(&self, tx_data: TxData) -> Result<TxDataHashNode> {
        let slot = SlabSlot::alloc(&self.slab)?;
        tracing::debug!(tx_id = %tx_data.tx_id, slot = slot.raw().index(), "allocated tx data node");
        Ok(TxDataHashNode { tx_data, slot })
    }

    /// Free the undo chain first, then the record's slot
    pub fn free_node(&self, node: TxDataHashNode) {
        let TxDataHashNode { tx_data, slot } = node;
        let tx_id = tx_data.tx_id;
        tx_data.undo_status_list().reset();
        drop(tx_data);
        tracing::debug!(%tx_id, slot = slot.raw().index(), "freed tx data node");
        drop(slot);
    }

    /// Counters of the shared slab
    pub fn stats(&self) -> SlabStats {
        self.slab.stats()
    }
}
