//! Transaction data memtables and handles to them

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// In-memory table that transaction records are written into
///
/// Writers pin the table by incrementing `write_ref` before writing and
/// decrementing it afterwards. A frozen table accepts no new writers and can
/// be released once its count drops to zero.
pub struct TxDataMemtable {
    id: u64,
    write_ref: AtomicI64,
    frozen: AtomicBool,
}

impl TxDataMemtable {
    /// Create an active table
    pub fn new(id: u64) -> Self {
        Self {
            id,
            write_ref: AtomicI64::new(0),
            frozen: AtomicBool::new(false),
        }
    }

    /// Table identity
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Writers currently pinning the table
    #[inline]
    pub fn write_ref(&self) -> i64 {
        self.write_ref.load(Ordering::Acquire)
    }

    /// Pin the table for writing; returns the new count
    #[inline]
    pub fn inc_write_ref(&self) -> i64 {
        self.write_ref.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Unpin the table; returns the new count
    pub fn dec_write_ref(&self) -> i64 {
        let count = self.write_ref.fetch_sub(1, Ordering::AcqRel) - 1;
        if count < 0 {
            tracing::error!(memtable = self.id, count, "memtable write ref dropped below zero");
        }
        count
    }

    /// Whether the table was frozen
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub(crate) fn set_frozen(&self) {
        self.frozen.store(true, Ordering::Release);
    }
}

impl fmt::Debug for TxDataMemtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxDataMemtable")
            .field("id", &self.id)
            .field("write_ref", &self.write_ref())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Possibly empty reference to a memtable
#[derive(Debug, Clone, Default)]
pub struct TxDataMemtableHandle {
    table: Option<Arc<TxDataMemtable>>,
}

impl TxDataMemtableHandle {
    /// Handle to `table`
    pub fn new(table: Arc<TxDataMemtable>) -> Self {
        Self { table: Some(table) }
    }

    /// True when the handle points at a table
    pub fn is_valid(&self) -> bool {
        self.table.is_some()
    }

    /// Referenced table
    pub fn table(&self) -> Option<&Arc<TxDataMemtable>> {
        self.table.as_ref()
    }

    /// Drop the reference
    pub fn reset(&mut self) {
        self.table = None;
    }
}
