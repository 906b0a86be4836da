//! Shared slab allocator for undo nodes and record slots.
//!
//! Every [`UndoNode`](crate::UndoNode) and every record placed in the version
//! store holds one slab slot for its lifetime. The slab is injected as an
//! `Arc<dyn SlabAllocator>` so tests can substitute their own implementation.
//!
//! # Slot lifecycle
//!
//! ```text
//! alloc_raw() ──► RawSlot{index, generation} ──► free_raw()
//!                                                   │
//!                         generation += 1 ◄─────────┘
//! ```
//!
//! A [`RawSlot`] is only accepted back while its generation matches the
//! slot's current generation. Freeing a stale or unknown slot is logged and
//! ignored, so a double free can never hand the same slot out twice.
//!
//! [`SlabSlot`] is the owning wrapper: it returns its slot when dropped.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use txdata_core::{Error, Result};

/// Generation-checked slot handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSlot {
    index: u32,
    generation: u32,
}

impl RawSlot {
    /// Slot index inside the slab
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when handed out
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Allocation counters of a slab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabStats {
    /// Slots currently handed out
    pub in_use: usize,
    /// Maximum slots, `None` when unbounded
    pub capacity: Option<usize>,
    /// Successful allocations since creation
    pub total_allocs: u64,
    /// Accepted frees since creation
    pub total_frees: u64,
    /// Frees rejected because the slot was stale or unknown
    pub rejected_frees: u64,
}

/// Fixed-size slot allocator shared by every record in a version store
pub trait SlabAllocator: Send + Sync + fmt::Debug {
    /// Hand out one slot, or `AllocFailed` when exhausted
    fn alloc_raw(&self) -> Result<RawSlot>;

    /// Return a slot; stale or unknown slots are ignored
    fn free_raw(&self, slot: RawSlot);

    /// Current counters
    fn stats(&self) -> SlabStats;
}

/// Owned slab slot, returned to its slab on drop
pub struct SlabSlot {
    raw: RawSlot,
    slab: Arc<dyn SlabAllocator>,
}

impl SlabSlot {
    /// Allocate a slot from `slab`
    pub fn alloc(slab: &Arc<dyn SlabAllocator>) -> Result<Self> {
        let raw = slab.alloc_raw()?;
        Ok(Self {
            raw,
            slab: Arc::clone(slab),
        })
    }

    /// Underlying handle
    pub fn raw(&self) -> RawSlot {
        self.raw
    }

    /// Slab this slot came from
    pub fn slab(&self) -> &Arc<dyn SlabAllocator> {
        &self.slab
    }
}

impl Drop for SlabSlot {
    fn drop(&mut self) {
        self.slab.free_raw(self.raw);
    }
}

impl fmt::Debug for SlabSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlabSlot")
            .field("index", &self.raw.index)
            .field("generation", &self.raw.generation)
            .finish()
    }
}

#[derive(Debug, Default)]
struct SlotEntry {
    generation: u32,
    occupied: bool,
}

#[derive(Debug, Default)]
struct SlabState {
    entries: Vec<SlotEntry>,
    free_list: Vec<u32>,
    in_use: usize,
    total_allocs: u64,
    total_frees: u64,
    rejected_frees: u64,
}

/// In-memory slab with optional capacity
///
/// # Thread Safety
///
/// All bookkeeping sits behind one mutex. The critical section is bounded and
/// never calls back into callers, so it is safe to allocate while holding an
/// undo status list's write lock.
pub struct SliceSlab {
    state: Mutex<SlabState>,
    capacity: Option<usize>,
}

impl SliceSlab {
    /// Create an unbounded slab
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlabState::default()),
            capacity: None,
        }
    }

    /// Create a slab that hands out at most `capacity` slots at once
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(SlabState::default()),
            capacity: Some(capacity),
        }
    }

    /// Create a slab wrapped as a shared allocator capability
    pub fn shared(capacity: Option<usize>) -> Arc<dyn SlabAllocator> {
        match capacity {
            Some(cap) => Arc::new(Self::with_capacity(cap)),
            None => Arc::new(Self::new()),
        }
    }
}

impl Default for SliceSlab {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabAllocator for SliceSlab {
    fn alloc_raw(&self) -> Result<RawSlot> {
        let mut state = self.state.lock();
        if let Some(capacity) = self.capacity {
            if state.in_use >= capacity {
                return Err(Error::AllocFailed {
                    in_use: state.in_use,
                    capacity,
                });
            }
        }

        let index = match state.free_list.pop() {
            Some(index) => index,
            None => {
                state.entries.push(SlotEntry::default());
                (state.entries.len() - 1) as u32
            }
        };
        let entry = &mut state.entries[index as usize];
        entry.occupied = true;
        let generation = entry.generation;

        state.in_use += 1;
        state.total_allocs += 1;
        Ok(RawSlot { index, generation })
    }

    fn free_raw(&self, slot: RawSlot) {
        let mut state = self.state.lock();
        let accepted = match state.entries.get_mut(slot.index as usize) {
            Some(entry) if entry.occupied && entry.generation == slot.generation => {
                entry.occupied = false;
                entry.generation = entry.generation.wrapping_add(1);
                true
            }
            _ => false,
        };

        if accepted {
            state.free_list.push(slot.index);
            state.in_use -= 1;
            state.total_frees += 1;
        } else {
            state.rejected_frees += 1;
            tracing::error!(
                index = slot.index,
                generation = slot.generation,
                "rejected free of stale or unknown slab slot"
            );
        }
    }

    fn stats(&self) -> SlabStats {
        let state = self.state.lock();
        SlabStats {
            in_use: state.in_use,
            capacity: self.capacity,
            total_allocs: state.total_allocs,
            total_frees: state.total_frees,
            rejected_frees: state.rejected_frees,
        }
    }
}

impl fmt::Debug for SliceSlab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("SliceSlab")
            .field("in_use", &stats.in_use)
            .field("capacity", &stats.capacity)
            .finish()
    }
}
