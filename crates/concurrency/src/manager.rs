//! Memtable manager for transaction records
//!
//! Keeps the list of memtables a transaction record may be written into:
//! exactly one active table plus, while a freeze is being flushed, frozen
//! ones.
//!
//! ## Write Protocol
//!
//! ```text
//! 1. get_all_memtables_for_write(&mut guard)
//!      for each table: inc_write_ref(), push handle into guard
//! 2. write the record
//! 3. drop(guard)   - every write_ref is given back exactly once
//! ```
//!
//! A frozen table is released only once no writer still pins it.

use crate::memtable::{TxDataMemtable, TxDataMemtableHandle};
use crate::write_guard::{MemtableWriteGuard, MAX_TX_DATA_MEMTABLE_CNT};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txdata_core::{Error, Result};

/// Owns the active and frozen transaction data memtables
///
/// # Thread Safety
///
/// The memtable list sits behind a reader/writer lock. Handing out write
/// guards only takes the read side, so writers never block each other;
/// `freeze` and `release_frozen` take the write side.
pub struct TxDataMemtableMgr {
    /// Oldest first; the last entry is the active table
    memtables: RwLock<Vec<Arc<TxDataMemtable>>>,

    /// Id of the next memtable
    next_id: AtomicU64,
}

impl TxDataMemtableMgr {
    /// Create a manager with one active memtable
    pub fn new() -> Self {
        Self {
            memtables: RwLock::new(vec![Arc::new(TxDataMemtable::new(1))]),
            next_id: AtomicU64::new(2),
        }
    }

    /// Number of memtables, frozen ones included
    pub fn memtable_count(&self) -> usize {
        self.memtables.read().len()
    }

    /// Ids of every memtable, oldest first
    pub fn memtable_ids(&self) -> Vec<u64> {
        self.memtables.read().iter().map(|t| t.id()).collect()
    }

    /// The table new records go into
    pub fn active_memtable(&self) -> Option<Arc<TxDataMemtable>> {
        self.memtables
            .read()
            .last()
            .filter(|table| !table.is_frozen())
            .cloned()
    }

    /// Pin every memtable for writing and hand the references to `guard`
    ///
    /// # Arguments
    /// * `guard` - Empty guard that receives one handle per memtable
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `guard` already holds handles. If a handle cannot
    /// be pushed, every reference taken so far is given back and the guard is
    /// left empty.
    pub fn get_all_memtables_for_write(&self, guard: &mut MemtableWriteGuard) -> Result<()> {
        if !guard.is_empty() {
            return Err(Error::invalid_argument(format!(
                "write guard already holds {} memtables",
                guard.size()
            )));
        }

        let memtables = self.memtables.read();
        for table in memtables.iter() {
            table.inc_write_ref();
            if let Err(e) = guard.push_back(TxDataMemtableHandle::new(Arc::clone(table))) {
                // Not taken by the guard: give this one back ourselves
                table.dec_write_ref();
                guard.reset();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Freeze the active memtable and open a new one
    ///
    /// Returns the id of the new active table. Fails with `InvalidArgument`
    /// while a single write guard could no longer cover every table.
    pub fn freeze(&self) -> Result<u64> {
        let mut memtables = self.memtables.write();
        if memtables.len() >= MAX_TX_DATA_MEMTABLE_CNT {
            return Err(Error::invalid_argument(format!(
                "{} memtables exist, release frozen ones first",
                memtables.len()
            )));
        }

        if let Some(active) = memtables.last() {
            active.set_frozen();
            tracing::debug!(memtable = active.id(), write_ref = active.write_ref(), "froze tx data memtable");
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        memtables.push(Arc::new(TxDataMemtable::new(id)));
        Ok(id)
    }

    /// Drop frozen memtables no writer pins any more
    ///
    /// Returns how many were released.
    pub fn release_frozen(&self) -> usize {
        let mut memtables = self.memtables.write();
        let before = memtables.len();
        memtables.retain(|table| {
            let releasable = table.is_frozen() && table.write_ref() == 0;
            if releasable {
                tracing::debug!(memtable = table.id(), "released frozen tx data memtable");
            }
            !releasable
        });
        before - memtables.len()
    }
}

impl Default for TxDataMemtableMgr {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TxDataMemtableMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDataMemtableMgr")
            .field("memtables", &*self.memtables.read())
            .finish()
    }
}
