//! Bundle of memtable handles held by one writer
//!
//! A transaction writing its record may touch the active memtable and, while a
//! freeze is in progress, the frozen one. The guard owns one write reference
//! per held handle and gives each back exactly once: on [`reset`], or on drop.
//!
//! [`reset`]: MemtableWriteGuard::reset

use crate::memtable::TxDataMemtableHandle;
use txdata_core::{Error, Result};

/// Handles a single guard can hold
pub const MAX_TX_DATA_MEMTABLE_CNT: usize = 2;

/// Write references on up to [`MAX_TX_DATA_MEMTABLE_CNT`] memtables
///
/// The caller increments a table's write reference before pushing its handle;
/// the guard decrements it.
#[derive(Debug, Default)]
pub struct MemtableWriteGuard {
    handles: [TxDataMemtableHandle; MAX_TX_DATA_MEMTABLE_CNT],
    size: usize,
}

impl MemtableWriteGuard {
    /// Empty guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Held handles
    pub fn size(&self) -> usize {
        self.size
    }

    /// True when no handle is held
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Held handles, in push order
    pub fn handles(&self) -> &[TxDataMemtableHandle] {
        &self.handles[..self.size]
    }

    /// Take ownership of one write reference
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty handle
    /// - `SizeOverflow` when the guard is full; the handle is not taken and
    ///   its write reference stays with the caller
    pub fn push_back(&mut self, handle: TxDataMemtableHandle) -> Result<()> {
        if !handle.is_valid() {
            return Err(Error::invalid_argument("push of an empty memtable handle"));
        }
        if self.size >= MAX_TX_DATA_MEMTABLE_CNT {
            tracing::warn!(size = self.size, "memtable write guard is full");
            return Err(Error::SizeOverflow {
                node_count: self.size,
                size: self.size + 1,
                limit: MAX_TX_DATA_MEMTABLE_CNT,
            });
        }
        self.handles[self.size] = handle;
        self.size += 1;
        Ok(())
    }

    /// Give back every held write reference, in slot order
    pub fn reset(&mut self) {
        for handle in self.handles.iter_mut() {
            if let Some(table) = handle.table() {
                table.dec_write_ref();
            }
            handle.reset();
        }
        self.size = 0;
    }
}

impl Drop for MemtableWriteGuard {
    fn drop(&mut self) {
        self.reset();
    }
}
