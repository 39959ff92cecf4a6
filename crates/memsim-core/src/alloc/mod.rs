//! Allocation disciplines over the simulated arena.
//!
//! Two mutually-exclusive allocators are available, selected at `init`
//! time: the flat free-list allocator ([`flat::FlatAllocator`]) and the
//! binary buddy allocator ([`buddy::BuddyAllocator`]). Both operate on
//! the shared [`crate::block::BlockTable`] and report through the same
//! [`ArenaStats`] shape.

pub mod buddy;
pub mod flat;

use crate::block::BlockId;

/// Outcome of a successful allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Id the client will use to free the block.
    pub id: BlockId,
    /// Starting offset of the allocated block.
    pub offset: usize,
    /// Granted size (equals the request in flat mode, the rounded
    /// power of two in buddy mode).
    pub size: usize,
}

/// Allocator-level statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub total_bytes: usize,
    pub used_bytes: usize,
    pub free_bytes: usize,
    pub free_blocks: usize,
    pub largest_free: usize,
    /// Buddy mode only: total bytes lost to power-of-two rounding.
    pub internal_fragmentation: Option<usize>,
    pub successes: u64,
    pub failures: u64,
}

impl ArenaStats {
    /// Largest free block over total free bytes; `None` when nothing is
    /// free (the ratio is undefined).
    #[must_use]
    pub fn external_fragmentation(&self) -> Option<f64> {
        if self.free_bytes == 0 {
            None
        } else {
            Some(self.largest_free as f64 / self.free_bytes as f64)
        }
    }

    /// Used fraction of the arena as a percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64 * 100.0
        }
    }
}
