//! Concurrent version store for transaction records
//!
//! Records are keyed by [`TxId`] in a DashMap with FxHash. Readers asking
//! "was statement N of transaction T rolled back?" only take the record's
//! shard read guard and the list's read lock.
//!
//! # Design
//!
//! - DashMap: sharded, reads never block each other
//! - FxHash: fast non-crypto hash, transaction ids are not attacker-chosen
//! - One shared slab: every record slot and undo node comes from it
//!
//! # Thread Safety
//!
//! All operations take `&self`. Do not hold a guard returned by
//! [`TxDataTable::get`] while calling a mutating method on the same table;
//! the shard lock is not reentrant.

use crate::alloc::{TxDataAllocHandle, TxDataHashNode};
use crate::slab::{SlabAllocator, SlabStats, SliceSlab};
use crate::tx_data::{TxCommitData, TxData};
use crate::undo_node::UndoNode;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use txdata_core::{Error, Result, SequenceNo, TxDataConfig, TxId, UndoAction};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Read guard over one stored record
pub type TxDataRef<'a> = Ref<'a, TxId, TxDataHashNode, FxBuildHasher>;

/// Version store: records of committed, aborted and running transactions
pub struct TxDataTable {
    map: DashMap<TxId, TxDataHashNode, FxBuildHasher>,
    alloc: TxDataAllocHandle,
    config: TxDataConfig,
}

impl TxDataTable {
    /// Create a table with its own slab
    ///
    /// The slab is bounded when `config.slab_capacity` is set.
    pub fn new(config: TxDataConfig) -> Result<Self> {
        let slab = SliceSlab::shared(config.slab_capacity);
        Self::with_slab(config, slab)
    }

    /// Create a table drawing from an existing slab
    pub fn with_slab(config: TxDataConfig, slab: Arc<dyn SlabAllocator>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            map: DashMap::with_hasher(FxBuildHasher::default()),
            alloc: TxDataAllocHandle::new(slab, config.undo_limits()),
            config,
        })
    }

    /// Configuration the table was built with
    pub fn config(&self) -> &TxDataConfig {
        &self.config
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no record is stored
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Counters of the shared slab
    pub fn slab_stats(&self) -> SlabStats {
        self.alloc.stats()
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// A running record for `tx_id`, not yet stored
    pub fn alloc_tx_data(&self, tx_id: TxId) -> TxData {
        self.alloc.new_tx_data(tx_id)
    }

    /// An unlinked undo node, for callers that pre-allocate spares
    pub fn alloc_undo_node(&self) -> Result<Box<UndoNode>> {
        UndoNode::alloc(self.alloc.slab())
    }

    // ========================================================================
    // Insert / Get / Remove
    // ========================================================================

    /// Store `tx_data`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the id is invalid, the record fails
    ///   [`TxData::is_valid_in_store`], or the id is already stored
    /// - `AllocFailed` if no slot is left for the record
    pub fn insert(&self, mut tx_data: TxData) -> Result<()> {
        let tx_id = tx_data.tx_id;
        if !tx_id.is_valid() {
            return Err(Error::invalid_argument(format!("invalid tx id {}", tx_id)));
        }
        if !tx_data.is_valid_in_store() {
            return Err(Error::invalid_argument(format!(
                "tx data {} is not valid in store",
                tx_id
            )));
        }

        match self.map.entry(tx_id) {
            Entry::Occupied(_) => {
                tracing::warn!(%tx_id, "tx data already in version store");
                Err(Error::invalid_argument(format!(
                    "tx data {} already inserted",
                    tx_id
                )))
            }
            Entry::Vacant(vacant) => {
                tx_data.in_version_store = true;
                let node = self.alloc.alloc_node(tx_data)?;
                vacant.insert(node);
                Ok(())
            }
        }
    }

    /// Read guard over the record of `tx_id`
    #[inline]
    pub fn get(&self, tx_id: TxId) -> Option<TxDataRef<'_>> {
        self.map.get(&tx_id)
    }

    /// Copy of the commit outcome of `tx_id`
    pub fn get_commit_data(&self, tx_id: TxId) -> Option<TxCommitData> {
        self.map.get(&tx_id).map(|node| node.commit_data().clone())
    }

    /// Check if a record exists
    #[inline]
    pub fn contains(&self, tx_id: TxId) -> bool {
        self.map.contains_key(&tx_id)
    }

    /// Remove and free the record of `tx_id`
    ///
    /// The undo chain goes back to the slab before the record slot. Returns
    /// false if nothing was stored.
    pub fn remove(&self, tx_id: TxId) -> bool {
        match self.map.remove(&tx_id) {
            Some((_, node)) => {
                self.alloc.free_node(node);
                true
            }
            None => false,
        }
    }

    /// Remove and free every record
    pub fn clear(&self) {
        let ids: Vec<TxId> = self.map.iter().map(|entry| *entry.key()).collect();
        for tx_id in ids {
            self.remove(tx_id);
        }
    }

    // ========================================================================
    // Undo history
    // ========================================================================

    /// Record a rollback for a stored transaction
    ///
    /// When the head looks full, a spare node is allocated before the list's
    /// write lock is taken. A head with room appends without touching the slab.
    ///
    /// # Arguments
    ///
    /// * `tx_id` - Stored transaction
    /// * `action` - Rolled-back interval
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `tx_id` is not stored, otherwise as
    /// [`UndoStatusList::append_and_compact`](crate::UndoStatusList::append_and_compact).
    pub fn add_undo_action(&self, tx_id: TxId, action: UndoAction) -> Result<()> {
        let node = self
            .map
            .get(&tx_id)
            .ok_or_else(|| Error::invalid_argument(format!("tx data {} not found", tx_id)))?;

        let spare = if node.undo_status_list().head_has_room() {
            None
        } else {
            match self.alloc_undo_node() {
                Ok(spare) => Some(spare),
                Err(e) => {
                    tracing::debug!(%tx_id, error = %e, "no spare undo node, appending without one");
                    None
                }
            }
        };
        node.add_undo_action(action, spare)
    }

    /// Whether statement `seq_no` of `tx_id` was rolled back
    ///
    /// `None` when the transaction is not stored.
    pub fn is_sequence_undone(&self, tx_id: TxId, seq_no: SequenceNo) -> Option<bool> {
        self.map
            .get(&tx_id)
            .map(|node| node.is_sequence_undone(seq_no))
    }

    /// Ids of every stored record, unordered
    pub fn tx_ids(&self) -> Vec<TxId> {
        self.map.iter().map(|entry| *entry.key()).collect()
    }
}

impl std::fmt::Debug for TxDataTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDataTable")
            .field("len", &self.map.len())
            .field("slab", &self.alloc.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use txdata_core::{Scn, TxState};

    fn action(from: i64, to: i64) -> UndoAction {
        UndoAction::new(from, to).unwrap()
    }

    fn table() -> TxDataTable {
        TxDataTable::new(TxDataConfig::default()).unwrap()
    }

    fn committed(table: &TxDataTable, id: i64) -> TxData {
        let mut tx_data = table.alloc_tx_data(TxId::new(id));
        tx_data.set_scn_range(Scn::new(10), Scn::new(20)).unwrap();
        tx_data.commit(Scn::new(25), false).unwrap();
        tx_data
    }

    #[test]
    fn test_table_is_send_sync() {
        static_assertions::assert_impl_all!(TxDataTable: Send, Sync);
        static_assertions::assert_impl_all!(TxData: Send, Sync);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = TxDataConfig::default().slice_size(0);
        assert!(matches!(TxDataTable::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_insert_and_get() {
        let table = table();
        table.insert(committed(&table, 1)).unwrap();
        assert_eq!(table.len(), 1);

        let node = table.get(TxId::new(1)).unwrap();
        assert!(node.in_version_store);
        assert_eq!(node.state, TxState::Commit);
        drop(node);

        let commit = table.get_commit_data(TxId::new(1)).unwrap();
        assert_eq!(commit.commit_version, Scn::new(25));
    }

    #[test]
    fn test_get_nonexistent() {
        let table = table();
        assert!(table.get(TxId::new(9)).is_none());
        assert_eq!(table.is_sequence_undone(TxId::new(9), 1), None);
    }

    #[test]
    fn test_insert_rejects_duplicates_and_invalid() {
        let table = table();
        table.insert(committed(&table, 1)).unwrap();
        assert!(matches!(
            table.insert(committed(&table, 1)),
            Err(Error::InvalidArgument(_))
        ));

        // Running without end scn or undo actions
        let running = table.alloc_tx_data(TxId::new(2));
        assert!(table.insert(running).is_err());

        assert!(table.insert(table.alloc_tx_data(TxId::INVALID)).is_err());
        assert_eq!(table.len(), 1);
        assert_eq!(table.slab_stats().in_use, 1);
    }

    #[test]
    fn test_add_undo_action_and_query() {
        let table = table();
        table.insert(committed(&table, 1)).unwrap();
        table.add_undo_action(TxId::new(1), action(10, 5)).unwrap();
        assert_eq!(table.is_sequence_undone(TxId::new(1), 7), Some(true));
        assert_eq!(table.is_sequence_undone(TxId::new(1), 3), Some(false));

        // Record slot plus one undo node
        assert_eq!(table.slab_stats().in_use, 2);
    }

    #[test]
    fn test_head_with_room_takes_no_spare() {
        let table = table();
        table.insert(committed(&table, 1)).unwrap();
        table.add_undo_action(TxId::new(1), action(5, 0)).unwrap();
        let allocs = table.slab_stats().total_allocs;

        for i in 1..7i64 {
            table
                .add_undo_action(TxId::new(1), action(i * 10 + 5, i * 10))
                .unwrap();
        }
        assert_eq!(table.slab_stats().total_allocs, allocs);
    }

    #[test]
    fn test_add_undo_action_unknown_tx() {
        let table = table();
        assert!(matches!(
            table.add_undo_action(TxId::new(5), action(2, 1)),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(table.slab_stats().in_use, 0);
    }

    #[test]
    fn test_remove_frees_everything() {
        let table = table();
        table.insert(committed(&table, 1)).unwrap();
        for i in 0..20i64 {
            table
                .add_undo_action(TxId::new(1), action(i * 10 + 5, i * 10))
                .unwrap();
        }
        assert!(table.remove(TxId::new(1)));
        assert!(!table.remove(TxId::new(1)));
        let stats = table.slab_stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.rejected_frees, 0);
    }

    #[test]
    fn test_clear() {
        let table = table();
        for id in 0..10 {
            table.insert(committed(&table, id)).unwrap();
        }
        assert_eq!(table.tx_ids().len(), 10);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.slab_stats().in_use, 0);
    }

    #[test]
    fn test_bounded_slab() {
        let config = TxDataConfig::default().slab_capacity(1);
        let table = TxDataTable::new(config).unwrap();
        table.insert(committed(&table, 1)).unwrap();
        assert!(table
            .insert(committed(&table, 2))
            .unwrap_err()
            .is_retryable());
        // The node needed for the action cannot be allocated either
        assert!(table
            .add_undo_action(TxId::new(1), action(3, 1))
            .unwrap_err()
            .is_retryable());
    }

    #[test]
    fn test_concurrent_writers_different_tx() {
        let table = Arc::new(table());
        for id in 0..4 {
            table.insert(committed(&table, id)).unwrap();
        }
        let handles: Vec<_> = (0..4i64)
            .map(|id| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..100i64 {
                        table
                            .add_undo_action(TxId::new(id), action(i * 10 + 5, i * 10))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for id in 0..4 {
            assert_eq!(table.is_sequence_undone(TxId::new(id), 995), Some(true));
            assert_eq!(table.is_sequence_undone(TxId::new(id), 996), Some(false));
        }
    }
}
