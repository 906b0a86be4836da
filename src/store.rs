//! Version store entry point.

use crate::error::{Error, Result};
use std::sync::Arc;
use txdata_concurrency::{MemtableWriteGuard, TxDataMemtableMgr};
use txdata_core::{Encode, Reader, SequenceNo, TxDataConfig, TxId, UndoAction};
use txdata_storage::{SlabAllocator, SlabStats, SliceSlab, TxCommitData, TxData, TxDataTable};

/// The txdata version store.
///
/// Holds one record per transaction, each with its rollback history, and
/// pins the transaction data memtables for the duration of every write.
/// Create a store using [`TxDataStore::open`] or [`TxDataStore::builder`].
///
/// # Example
///
/// ```
/// use txdata::prelude::*;
///
/// let store = TxDataStore::open(TxDataConfig::default())?;
///
/// let mut tx_data = store.begin(TxId::new(1));
/// tx_data.set_scn_range(Scn::new(10), Scn::new(20))?;
/// tx_data.commit(Scn::new(21), false)?;
/// store.insert(tx_data)?;
///
/// store.add_undo_action(TxId::new(1), UndoAction::new(8, 3)?)?;
/// assert!(store.is_sequence_undone(TxId::new(1), 5)?);
/// # Ok::<(), txdata::Error>(())
/// ```
pub struct TxDataStore {
    table: TxDataTable,
    memtables: TxDataMemtableMgr,
}

impl TxDataStore {
    /// Open a store with its own slab.
    pub fn open(config: TxDataConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> TxDataStoreBuilder {
        TxDataStoreBuilder::new()
    }

    /// Underlying version store table.
    pub fn table(&self) -> &TxDataTable {
        &self.table
    }

    /// Memtables pinned by writes.
    pub fn memtables(&self) -> &TxDataMemtableMgr {
        &self.memtables
    }

    /// Counters of the shared slab.
    pub fn slab_stats(&self) -> SlabStats {
        self.table.slab_stats()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when no record is stored.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// A running record for `tx_id`, not yet stored.
    pub fn begin(&self, tx_id: TxId) -> TxData {
        self.table.alloc_tx_data(tx_id)
    }

    /// Store a record.
    pub fn insert(&self, tx_data: TxData) -> Result<()> {
        let _guard = self.pin_memtables()?;
        let tx_id = tx_data.tx_id;
        self.table.insert(tx_data)?;
        tracing::debug!(%tx_id, "inserted tx data");
        Ok(())
    }

    /// Record a rollback for a stored transaction.
    ///
    /// [`Error::SizeOverflow`] means the action was stored but the history is
    /// past its size limit.
    pub fn add_undo_action(&self, tx_id: TxId, action: UndoAction) -> Result<()> {
        let _guard = self.pin_memtables()?;
        self.table.add_undo_action(tx_id, action).map_err(|e| match e {
            txdata_core::Error::InvalidArgument(_) if !self.table.contains(tx_id) => {
                Error::NotFound(format!("tx {}", tx_id))
            }
            e => e.into(),
        })
    }

    /// Whether statement `seq_no` of `tx_id` was rolled back.
    pub fn is_sequence_undone(&self, tx_id: TxId, seq_no: SequenceNo) -> Result<bool> {
        self.table
            .is_sequence_undone(tx_id, seq_no)
            .ok_or_else(|| Error::NotFound(format!("tx {}", tx_id)))
    }

    /// Commit outcome of `tx_id`.
    pub fn commit_data(&self, tx_id: TxId) -> Result<TxCommitData> {
        self.table
            .get_commit_data(tx_id)
            .ok_or_else(|| Error::NotFound(format!("tx {}", tx_id)))
    }

    /// Remove and free the record of `tx_id`.
    pub fn remove(&self, tx_id: TxId) -> bool {
        self.table.remove(tx_id)
    }

    /// Encode the record of `tx_id`.
    pub fn serialize_tx_data(&self, tx_id: TxId) -> Result<Vec<u8>> {
        let node = self
            .table
            .get(tx_id)
            .ok_or_else(|| Error::NotFound(format!("tx {}", tx_id)))?;
        Ok(node.tx_data().to_bytes()?)
    }

    /// Decode a record and store it.
    ///
    /// Returns the stored transaction's id.
    pub fn load_tx_data(&self, bytes: &[u8]) -> Result<TxId> {
        let mut tx_data = self.begin(TxId::INVALID);
        tx_data.deserialize(&mut Reader::new(bytes))?;
        let tx_id = tx_data.tx_id;
        self.insert(tx_data)?;
        Ok(tx_id)
    }

    /// Freeze the active memtable; returns the new active memtable's id.
    pub fn freeze(&self) -> Result<u64> {
        Ok(self.memtables.freeze()?)
    }

    /// Release frozen memtables no writer pins any more.
    pub fn release_frozen(&self) -> usize {
        self.memtables.release_frozen()
    }

    /// Human-readable dump of one record.
    pub fn dump_tx_data<W: std::io::Write>(&self, tx_id: TxId, out: &mut W) -> Result<()> {
        let node = self
            .table
            .get(tx_id)
            .ok_or_else(|| Error::NotFound(format!("tx {}", tx_id)))?;
        node.tx_data().dump_to_text(out)?;
        Ok(())
    }

    fn pin_memtables(&self) -> Result<MemtableWriteGuard> {
        let mut guard = MemtableWriteGuard::new();
        self.memtables.get_all_memtables_for_write(&mut guard)?;
        Ok(guard)
    }
}

impl std::fmt::Debug for TxDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDataStore")
            .field("table", &self.table)
            .field("memtables", &self.memtables)
            .finish()
    }
}

/// Builder for [`TxDataStore`].
///
/// # Example
///
/// ```
/// use txdata::prelude::*;
///
/// let store = TxDataStore::builder()
///     .max_tx_serialize_size(64 * 1024)
///     .slab_capacity(10_000)
///     .build()?;
/// assert!(store.is_empty());
/// # Ok::<(), txdata::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct TxDataStoreBuilder {
    config: TxDataConfig,
    slab: Option<Arc<dyn SlabAllocator>>,
}

impl TxDataStoreBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: TxDataConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse the configuration from TOML.
    pub fn config_toml(mut self, input: &str) -> Result<Self> {
        self.config = TxDataConfig::from_toml_str(input)?;
        Ok(self)
    }

    /// Set the per-node slice size.
    pub fn slice_size(mut self, bytes: usize) -> Self {
        self.config = self.config.slice_size(bytes);
        self
    }

    /// Set the serialize-size ceiling of one undo history.
    pub fn max_tx_serialize_size(mut self, bytes: usize) -> Self {
        self.config = self.config.max_tx_serialize_size(bytes);
        self
    }

    /// Bound the slab the store creates.
    pub fn slab_capacity(mut self, slots: usize) -> Self {
        self.config = self.config.slab_capacity(slots);
        self
    }

    /// Draw from an existing slab instead of creating one.
    pub fn slab(mut self, slab: Arc<dyn SlabAllocator>) -> Self {
        self.slab = Some(slab);
        self
    }

    /// Build the store.
    pub fn build(self) -> Result<TxDataStore> {
        let slab = match self.slab {
            Some(slab) => slab,
            None => SliceSlab::shared(self.config.slab_capacity),
        };
        let table = TxDataTable::with_slab(self.config, slab)?;
        Ok(TxDataStore {
            table,
            memtables: TxDataMemtableMgr::new(),
        })
    }
}
