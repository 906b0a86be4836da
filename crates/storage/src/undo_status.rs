//! Undo status list: the rollback history of one transaction.
//!
//! The list is a singly linked chain of [`UndoNode`]s, newest node at the head.
//! Inside a node, actions are stored oldest first. Every node except the head
//! is full, which lets serialization and deserialization reproduce the exact
//! topology.
//!
//! ```text
//! head ──► [a15 a16 _ _ _ _ _] ──► [a8 .. a14] ──► [a1 .. a7] ──► None
//!          newest (partial)                        oldest (full)
//! ```
//!
//! # Compaction
//!
//! Appending an action first merges it with the trailing actions of the
//! newest node while they are mergeable, walking into older nodes as newer
//! ones empty out. Emptied nodes are unlinked and returned to the slab. The
//! merged action is then appended, linking a new head node if needed.
//!
//! The merge is planned on a read-only walk before anything is changed, so a
//! failed node allocation leaves the list exactly as it was.
//!
//! # Wire format
//!
//! ```text
//! Envelope(node_count:vi64  action*)      actions oldest first
//! ```
//!
//! # Thread Safety
//!
//! One reader/writer lock per list. [`UndoStatusList::contains_sequence`] and
//! serialization take the read side; appends, deserialization and resets take
//! the write side.

use crate::slab::SlabAllocator;
use crate::undo_node::{UndoNode, UNDO_ACTIONS_PER_NODE};
use parking_lot::{RwLock, RwLockReadGuard};
use smallvec::SmallVec;
use std::fmt;
use std::io;
use std::sync::Arc;
use txdata_core::codec::{encoded_length_vi64, envelope_len};
use txdata_core::{Decode, Encode, Error, Reader, Result, SequenceNo, UndoAction, UndoLimits, Writer};

/// Chain state guarded by the list's lock
#[derive(Default)]
pub(crate) struct UndoChain {
    head: Option<Box<UndoNode>>,
    node_count: usize,
}

/// Outcome of the read-only merge walk
#[derive(Debug, Clone, Copy)]
struct MergePlan {
    merged: UndoAction,
    freed_nodes: usize,
    /// Size the surviving head keeps, `None` when the chain empties
    head_size: Option<usize>,
}

impl MergePlan {
    fn needs_node(&self) -> bool {
        match self.head_size {
            Some(size) => size >= UNDO_ACTIONS_PER_NODE,
            None => true,
        }
    }
}

impl UndoChain {
    fn nodes(&self) -> NodeIter<'_> {
        NodeIter {
            cursor: self.head.as_deref(),
        }
    }

    fn action_count(&self) -> usize {
        self.nodes().map(UndoNode::size).sum()
    }

    fn check_consistency(&self) -> Result<()> {
        if self.head.is_some() != (self.node_count > 0) {
            tracing::error!(
                node_count = self.node_count,
                has_head = self.head.is_some(),
                "undo status list head and node count disagree"
            );
            return Err(Error::unexpected(format!(
                "undo node count {} with head present = {}",
                self.node_count,
                self.head.is_some()
            )));
        }
        Ok(())
    }

    fn plan_merge(&self, action: UndoAction) -> MergePlan {
        let mut merged = action;
        let mut freed_nodes = 0;
        let mut head_size = None;

        for node in self.nodes() {
            let mut size = node.size();
            while size > 0 {
                let existing = node.action_at(size - 1);
                if !merged.is_mergeable(existing) {
                    break;
                }
                tracing::trace!(%existing, %merged, "merging undo action");
                merged.merge(existing);
                size -= 1;
            }
            if size == 0 {
                freed_nodes += 1;
            } else {
                head_size = Some(size);
                break;
            }
        }

        MergePlan {
            merged,
            freed_nodes,
            head_size,
        }
    }

    /// Carry out `plan`, linking `new_node` if the head has no room.
    fn apply(&mut self, plan: MergePlan, mut new_node: Option<Box<UndoNode>>) -> Result<()> {
        if plan.freed_nodes > self.node_count {
            tracing::error!(
                freed = plan.freed_nodes,
                node_count = self.node_count,
                "merge would free more undo nodes than the list holds"
            );
            return Err(Error::unexpected("invalid undo node count in undo status list"));
        }

        let mut recycled = None;
        for _ in 0..plan.freed_nodes {
            if let Some(mut node) = self.head.take() {
                self.head = node.next.take();
                self.node_count -= 1;
                // Keep the most recent emptied node around in case a new head is needed
                recycled = Some(node);
            }
        }

        if let (Some(size), Some(head)) = (plan.head_size, self.head.as_mut()) {
            head.truncate(size);
        }

        if plan.needs_node() {
            let mut node = match recycled.take() {
                Some(mut node) => {
                    node.truncate(0);
                    node
                }
                None => new_node.take().ok_or_else(|| {
                    Error::unexpected("undo status list needs a node but none was provided")
                })?,
            };
            node.next = self.head.take();
            self.head = Some(node);
            self.node_count += 1;
        }

        match self.head.as_mut() {
            Some(head) => {
                head.push(plan.merged);
                Ok(())
            }
            None => Err(Error::unexpected("undo status list has no head after append")),
        }
    }

    fn contains(&self, seq_no: SequenceNo) -> bool {
        self.nodes()
            .any(|node| node.actions().iter().any(|a| a.is_contain(seq_no)))
    }

    pub(crate) fn payload_len(&self) -> usize {
        let actions: usize = self
            .nodes()
            .flat_map(|node| node.actions().iter())
            .map(Encode::encoded_len)
            .sum();
        encoded_length_vi64(self.node_count as i64) + actions
    }

    pub(crate) fn encoded_len(&self) -> usize {
        envelope_len(self.payload_len())
    }

    pub(crate) fn encode(&self, w: &mut Writer<'_>) -> Result<()> {
        let payload_len = self.payload_len();
        w.put_envelope(payload_len, |w| {
            w.put_vi64(self.node_count as i64)?;
            // Collect head-to-tail, emit tail-to-head so the oldest action comes first
            let stack: SmallVec<[&UndoNode; 8]> = self.nodes().collect();
            for node in stack.iter().rev() {
                for action in node.actions() {
                    action.encode(w)?;
                }
            }
            Ok(())
        })
    }

    pub(crate) fn decode(payload: &mut Reader<'_>, slab: &Arc<dyn SlabAllocator>) -> Result<UndoChain> {
        let declared = payload.get_vi64()?;
        if declared < 0 {
            return Err(Error::deserialize(format!(
                "negative undo node count {}",
                declared
            )));
        }

        let mut chain = UndoChain::default();
        while !payload.is_empty() {
            let action = UndoAction::decode(payload)?;
            chain.push_oldest_first(action, slab)?;
        }

        if chain.node_count as i64 != declared {
            return Err(Error::deserialize(format!(
                "undo node count {} does not match {} rebuilt nodes",
                declared, chain.node_count
            )));
        }
        Ok(chain)
    }

    /// Append while rebuilding a chain from oldest-first actions
    fn push_oldest_first(&mut self, action: UndoAction, slab: &Arc<dyn SlabAllocator>) -> Result<()> {
        let head_full = self.head.as_ref().map_or(true, |head| head.is_full());
        if head_full {
            let mut node = UndoNode::alloc(slab)?;
            node.next = self.head.take();
            self.head = Some(node);
            self.node_count += 1;
        }
        if let Some(head) = self.head.as_mut() {
            head.push(action);
        }
        Ok(())
    }

    fn actions_oldest_first(&self) -> Vec<UndoAction> {
        let stack: SmallVec<[&UndoNode; 8]> = self.nodes().collect();
        stack
            .iter()
            .rev()
            .flat_map(|node| node.actions().iter().copied())
            .collect()
    }
}

struct NodeIter<'a> {
    cursor: Option<&'a UndoNode>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a UndoNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cursor?;
        self.cursor = node.next();
        Some(node)
    }
}

/// Rollback history of one transaction
pub struct UndoStatusList {
    chain: RwLock<UndoChain>,
    slab: Arc<dyn SlabAllocator>,
    limits: UndoLimits,
}

impl UndoStatusList {
    /// Create an empty list drawing nodes from `slab`
    pub fn new(slab: Arc<dyn SlabAllocator>, limits: UndoLimits) -> Self {
        Self {
            chain: RwLock::new(UndoChain::default()),
            slab,
            limits,
        }
    }

    /// Slab this list allocates from
    pub fn slab(&self) -> &Arc<dyn SlabAllocator> {
        &self.slab
    }

    /// Size limits enforced on append
    pub fn limits(&self) -> UndoLimits {
        self.limits
    }

    pub(crate) fn read_chain(&self) -> RwLockReadGuard<'_, UndoChain> {
        self.chain.read()
    }

    /// Merge `action` into the history and store it.
    ///
    /// `spare` is a pre-allocated node the caller obtained before contending
    /// on any lock; it is linked only if the head has no room. An unused spare
    /// is returned to the slab after the lock is released.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed action
    /// - `AllocFailed` when a node is needed and none can be obtained; the
    ///   list is unchanged
    /// - `SizeOverflow` when the list grew past the serialize limit; the
    ///   action **is** stored
    /// - `Unexpected` when the node count and chain disagree
    pub fn append_and_compact(
        &self,
        action: UndoAction,
        mut spare: Option<Box<UndoNode>>,
    ) -> Result<()> {
        if !action.is_valid() {
            return Err(Error::invalid_argument(format!(
                "cannot append malformed undo action {}",
                action
            )));
        }

        let mut chain = self.chain.write();
        chain.check_consistency()?;

        let plan = chain.plan_merge(action);
        let new_node = if plan.needs_node() && plan.freed_nodes == 0 {
            match spare.take() {
                Some(node) => Some(node),
                None => Some(UndoNode::alloc(&self.slab)?),
            }
        } else {
            None
        };
        chain.apply(plan, new_node)?;

        let node_count = chain.node_count;
        drop(chain);

        if spare.is_some() {
            tracing::debug!("returning unused spare undo node");
        }
        drop(spare);

        if self.limits.is_overflow(node_count) {
            let size = self.limits.footprint(node_count);
            tracing::warn!(
                node_count,
                size,
                limit = self.limits.max_tx_serialize_size,
                "too many undo actions, tx data size overflow"
            );
            return Err(Error::SizeOverflow {
                node_count,
                size,
                limit: self.limits.max_tx_serialize_size,
            });
        }
        Ok(())
    }

    /// Whether `seq_no` falls inside any stored action
    pub fn contains_sequence(&self, seq_no: SequenceNo) -> bool {
        self.chain.read().contains(seq_no)
    }

    /// Nodes in the chain
    pub fn node_count(&self) -> usize {
        self.chain.read().node_count
    }

    /// Actions across all nodes
    pub fn action_count(&self) -> usize {
        self.chain.read().action_count()
    }

    /// True when no action is stored
    pub fn is_empty(&self) -> bool {
        self.chain.read().head.is_none()
    }

    /// Whether the next append fits in the current head without a new node
    pub fn head_has_room(&self) -> bool {
        self.chain
            .read()
            .head
            .as_deref()
            .is_some_and(|head| head.size() < UNDO_ACTIONS_PER_NODE)
    }

    /// Per-node sizes, head (newest) first
    pub fn node_sizes(&self) -> Vec<usize> {
        self.chain.read().nodes().map(UndoNode::size).collect()
    }

    /// Actions per node, head (newest) first; oldest first within a node
    pub fn node_actions(&self) -> Vec<Vec<UndoAction>> {
        self.chain
            .read()
            .nodes()
            .map(|node| node.actions().to_vec())
            .collect()
    }

    /// All actions in logical order, oldest first
    pub fn actions_oldest_first(&self) -> Vec<UndoAction> {
        self.chain.read().actions_oldest_first()
    }

    /// Return every node to the slab
    pub fn reset(&self) {
        let old = std::mem::take(&mut *self.chain.write());
        if old.node_count > 0 {
            tracing::debug!(node_count = old.node_count, "freeing undo status list");
        }
        drop(old);
    }

    /// Exact size of [`UndoStatusList::serialize`]'s output
    pub fn get_serialize_size(&self) -> usize {
        self.chain.read().encoded_len()
    }

    /// Write the envelope and payload at the writer's position
    pub fn serialize(&self, w: &mut Writer<'_>) -> Result<()> {
        let chain = self.chain.read();
        chain.encode(w).map_err(|e| {
            tracing::warn!(error = %e, pos = w.pos(), "serialize undo status list failed");
            e
        })
    }

    /// Replace the contents with the list encoded at the reader's position.
    ///
    /// The new chain is built off to the side and swapped in only when the
    /// whole payload decoded. On error the list is unchanged and any node
    /// allocated along the way is back in the slab.
    pub fn deserialize(&self, r: &mut Reader<'_>) -> Result<()> {
        let decoded = r
            .get_envelope()
            .and_then(|mut payload| UndoChain::decode(&mut payload, &self.slab));
        let chain = match decoded {
            Ok(chain) => chain,
            Err(e) => {
                tracing::warn!(error = %e, pos = r.pos(), "deserialize undo status list failed");
                return Err(e);
            }
        };

        let old = std::mem::replace(&mut *self.chain.write(), chain);
        drop(old);
        Ok(())
    }

    /// Deep copy with freshly allocated nodes of the same topology
    pub fn try_clone(&self) -> Result<UndoStatusList> {
        let actions = self.actions_oldest_first();
        let mut chain = UndoChain::default();
        for action in actions {
            chain.push_oldest_first(action, &self.slab)?;
        }
        Ok(UndoStatusList {
            chain: RwLock::new(chain),
            slab: Arc::clone(&self.slab),
            limits: self.limits,
        })
    }

    /// Same node count, node sizes and actions
    pub fn equals(&self, other: &UndoStatusList) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        // Never hold both locks: a fair lock with a queued writer on each side
        // would deadlock two lists comparing each other
        let lhs = self.node_actions();
        let rhs = other.chain.read();
        lhs.len() == rhs.node_count
            && lhs
                .iter()
                .map(Vec::as_slice)
                .eq(rhs.nodes().map(UndoNode::actions))
    }

    /// Human-readable dump, newest action first
    pub fn dump_to_text<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let chain = self.chain.read();
        if chain.head.is_none() {
            return Ok(());
        }
        write!(out, "    UNDO_STATUS:{{")?;
        for node in chain.nodes() {
            for action in node.actions().iter().rev() {
                write!(out, "{}", action)?;
            }
        }
        write!(out, "}}")
    }
}

impl Encode for UndoStatusList {
    fn encoded_len(&self) -> usize {
        self.get_serialize_size()
    }

    fn encode(&self, w: &mut Writer<'_>) -> Result<()> {
        self.serialize(w)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        // One guard for both the size prediction and the write
        let chain = self.chain.read();
        let mut buf = vec![0u8; chain.encoded_len()];
        let mut w = Writer::new(&mut buf)?;
        chain.encode(&mut w)?;
        Ok(buf)
    }
}

impl fmt::Display for UndoStatusList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self.chain.read();
        write!(f, "{{head:")?;
        match chain.head.as_deref() {
            Some(head) => write!(f, "slot#{}", head.slot().index())?,
            None => write!(f, "null")?,
        }
        write!(f, ", undo_node_cnt:{}", chain.node_count)?;
        for node in chain.nodes() {
            for action in node.actions() {
                write!(f, ", undo_action:{}", action)?;
            }
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for UndoStatusList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self.chain.read();
        f.debug_struct("UndoStatusList")
            .field("node_count", &chain.node_count)
            .field("action_count", &chain.action_count())
            .finish()
    }
}
