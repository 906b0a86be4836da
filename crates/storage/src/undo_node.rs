//! Fixed-capacity block of undo actions.

use crate::slab::{RawSlot, SlabAllocator, SlabSlot};
use std::fmt;
use std::sync::Arc;
use txdata_core::{Result, UndoAction};

/// Undo actions stored per node
pub const UNDO_ACTIONS_PER_NODE: usize = 7;

/// One link of an undo status list
///
/// A node owns its slab slot and, through `next`, every older node behind it.
/// Nodes are only created by [`UndoNode::alloc`] and are only reachable through
/// the list that owns them, so a node handed back to the slab can never be
/// observed again.
pub struct UndoNode {
    actions: [UndoAction; UNDO_ACTIONS_PER_NODE],
    size: usize,
    pub(crate) next: Option<Box<UndoNode>>,
    slot: SlabSlot,
}

impl UndoNode {
    /// Allocate an empty, unlinked node from `slab`
    pub fn alloc(slab: &Arc<dyn SlabAllocator>) -> Result<Box<UndoNode>> {
        let slot = SlabSlot::alloc(slab)?;
        tracing::debug!(slot = slot.raw().index(), "allocated undo status node");
        Ok(Box::new(UndoNode {
            actions: [UndoAction::default(); UNDO_ACTIONS_PER_NODE],
            size: 0,
            next: None,
            slot,
        }))
    }

    /// Number of stored actions
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// True when no further action fits
    #[inline]
    pub fn is_full(&self) -> bool {
        self.size >= UNDO_ACTIONS_PER_NODE
    }

    /// True when the node holds no action
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Stored actions, oldest first
    pub fn actions(&self) -> &[UndoAction] {
        &self.actions[..self.size]
    }

    /// Next older node
    pub fn next(&self) -> Option<&UndoNode> {
        self.next.as_deref()
    }

    /// Slab slot backing this node
    pub fn slot(&self) -> RawSlot {
        self.slot.raw()
    }

    pub(crate) fn action_at(&self, idx: usize) -> &UndoAction {
        &self.actions[idx]
    }

    pub(crate) fn push(&mut self, action: UndoAction) {
        debug_assert!(!self.is_full(), "push into a full undo node");
        self.actions[self.size] = action;
        self.size += 1;
    }

    pub(crate) fn truncate(&mut self, size: usize) {
        debug_assert!(size <= self.size);
        self.size = size;
    }
}

impl Drop for UndoNode {
    fn drop(&mut self) {
        // Unlink iteratively so long chains do not recurse
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

impl fmt::Debug for UndoNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoNode")
            .field("size", &self.size)
            .field("has_next", &self.next.is_some())
            .field("slot", &self.slot.raw().index())
            .finish()
    }
}
