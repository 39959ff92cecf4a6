//! Binary buddy allocator.
//!
//! Every block's size is a power of two and its offset is a multiple of
//! its size, so a block's buddy is found by `offset XOR size` with no
//! stored links. `malloc` splits the lowest-offset free block of the
//! lowest sufficient order down to the required order; `free` merges
//! buddy pairs back up while the buddy is free.
//!
//! The original request size is retained per used block so `stats` can
//! report internal fragmentation from power-of-two rounding.

use std::collections::HashMap;

use super::{ArenaStats, Placement};
use crate::block::{Block, BlockId, BlockTable};
use crate::error::SimError;

/// Buddy allocator over a power-of-two arena.
#[derive(Debug, Clone)]
pub struct BuddyAllocator {
    table: BlockTable,
    /// Originally requested size per used block id.
    requested: HashMap<BlockId, usize>,
    successes: u64,
    failures: u64,
}

impl BuddyAllocator {
    /// Creates an allocator whose capacity is `size` rounded up to the
    /// next power of two, starting as a single free block.
    ///
    /// Sizes beyond the largest representable power of two are rejected
    /// rather than wrapped.
    pub fn new(size: usize) -> Result<Self, SimError> {
        let capacity = size.max(1).checked_next_power_of_two().ok_or_else(|| {
            SimError::BadArgument(format!(
                "size {size} too large to round up to a power of two"
            ))
        })?;
        Ok(Self {
            table: BlockTable::new(capacity),
            requested: HashMap::new(),
            successes: 0,
            failures: 0,
        })
    }

    /// Arena capacity (always a power of two).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.total_size()
    }

    #[must_use]
    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    /// Allocates the smallest power-of-two block of at least `size`
    /// bytes, splitting larger free blocks as needed. On failure the
    /// table is left untouched.
    pub fn malloc(&mut self, size: usize) -> Result<Placement, SimError> {
        // A request that cannot even be rounded to a power of two can
        // never fit; report it like any other unsatisfiable request.
        let want = size.max(1).checked_next_power_of_two().unwrap_or(usize::MAX);
        if want <= self.capacity() {
            // Lowest sufficient order first; the table is offset-ordered,
            // so the first match at a given order is the lowest offset.
            let mut order_size = want;
            while order_size <= self.capacity() {
                let found = self
                    .table
                    .blocks()
                    .iter()
                    .position(|b| b.is_free() && b.size == order_size);
                if let Some(index) = found {
                    return Ok(self.place(index, want, size));
                }
                let Some(next) = order_size.checked_mul(2) else {
                    break;
                };
                order_size = next;
            }
        }
        self.failures += 1;
        Err(SimError::OutOfMemory { requested: size })
    }

    /// Splits the free block at `index` down to `want` bytes and marks
    /// the low half used.
    fn place(&mut self, index: usize, want: usize, requested: usize) -> Placement {
        let matched = self.table.blocks()[index];
        let id = self.table.issue_id();

        // Low half stays allocated; each split sheds a free buddy of
        // ascending size above it.
        let mut replacement = vec![Block::used(id, matched.offset, want)];
        let mut half = want;
        while half < matched.size {
            replacement.push(Block::free(matched.offset + half, half));
            half *= 2;
        }
        self.table.splice(index..index + 1, replacement);

        self.requested.insert(id, requested);
        self.successes += 1;
        Placement {
            id,
            offset: matched.offset,
            size: want,
        }
    }

    /// Releases the used block carrying `id`, merging buddy pairs
    /// upward while the buddy is free. Returns the freed block's offset.
    pub fn free(&mut self, id: BlockId) -> Result<usize, SimError> {
        let mut index = self.table.find_used(id).ok_or(SimError::InvalidId(id))?;
        let freed = self.table.blocks()[index];
        self.requested.remove(&id);

        self.table
            .splice(index..index + 1, vec![Block::free(freed.offset, freed.size)]);

        loop {
            let block = self.table.blocks()[index];
            if block.size >= self.capacity() {
                break;
            }
            let buddy_offset = block.offset ^ block.size;
            let Some(buddy_index) = self.table.find_free_at(buddy_offset, block.size) else {
                break;
            };
            // Buddies cover adjacent spans, so they are table neighbors.
            debug_assert_eq!(buddy_index.abs_diff(index), 1);
            let low = index.min(buddy_index);
            let low_offset = block.offset.min(buddy_offset);
            self.table
                .splice(low..low + 2, vec![Block::free(low_offset, block.size * 2)]);
            index = low;
        }

        Ok(freed.offset)
    }

    /// Statistics snapshot for the `stats` command.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            total_bytes: self.capacity(),
            used_bytes: self.table.used_bytes(),
            free_bytes: self.table.free_bytes(),
            free_blocks: self.table.free_block_count(),
            largest_free: self.table.largest_free(),
            internal_fragmentation: Some(self.internal_fragmentation()),
            successes: self.successes,
            failures: self.failures,
        }
    }

    /// Total bytes lost to rounding across all used blocks.
    #[must_use]
    pub fn internal_fragmentation(&self) -> usize {
        self.table
            .blocks()
            .iter()
            .filter(|b| !b.is_free())
            .map(|b| {
                let asked = b
                    .id
                    .and_then(|id| self.requested.get(&id))
                    .copied()
                    .unwrap_or(b.size);
                b.size - asked
            })
            .sum()
    }

    /// Checks the buddy alignment invariant over the whole table.
    #[cfg(test)]
    fn invariants_hold(&self) -> bool {
        self.table.is_contiguous()
            && self.table.blocks().iter().all(|b| {
                b.size.is_power_of_two() && b.offset % b.size == 0
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_up_to_power_of_two() {
        // init buddy 100 -> capacity 128.
        assert_eq!(BuddyAllocator::new(100).unwrap().capacity(), 128);
        assert_eq!(BuddyAllocator::new(128).unwrap().capacity(), 128);
        assert_eq!(BuddyAllocator::new(1).unwrap().capacity(), 1);
    }

    #[test]
    fn test_malloc_rounds_and_aligns() {
        // buddy 100 -> capacity 128; malloc 40 -> 64-byte
        // block at offset 0 with 24 bytes of internal fragmentation.
        let mut buddy = BuddyAllocator::new(100).unwrap();
        let p = buddy.malloc(40).unwrap();
        assert_eq!(p, Placement { id: 0, offset: 0, size: 64 });
        assert_eq!(buddy.internal_fragmentation(), 24);
        assert!(buddy.invariants_hold());
    }

    #[test]
    fn test_split_produces_buddy_ladder() {
        let mut buddy = BuddyAllocator::new(128).unwrap();
        let p = buddy.malloc(16).unwrap();
        assert_eq!((p.offset, p.size), (0, 16));
        // Free buddies at 16 (16B), 32 (32B), 64 (64B).
        let free: Vec<(usize, usize)> = buddy
            .table()
            .blocks()
            .iter()
            .filter(|b| b.is_free())
            .map(|b| (b.offset, b.size))
            .collect();
        assert_eq!(free, vec![(16, 16), (32, 32), (64, 64)]);
        assert!(buddy.invariants_hold());
    }

    #[test]
    fn test_alloc_free_round_trip_restores_arena() {
        let mut buddy = BuddyAllocator::new(256).unwrap();
        let before = buddy.table().blocks().to_vec();
        let p = buddy.malloc(10).unwrap();
        buddy.free(p.id).unwrap();
        assert_eq!(buddy.table().blocks(), &before[..]);
        assert_eq!(buddy.internal_fragmentation(), 0);
    }

    #[test]
    fn test_merge_stops_at_used_buddy() {
        let mut buddy = BuddyAllocator::new(64).unwrap();
        let a = buddy.malloc(16).unwrap(); // [0,16)
        let b = buddy.malloc(16).unwrap(); // [16,32)
        buddy.free(a.id).unwrap();
        // a's buddy (b) is used: no merge, 16-byte hole stays.
        let free: Vec<(usize, usize)> = buddy
            .table()
            .blocks()
            .iter()
            .filter(|bl| bl.is_free())
            .map(|bl| (bl.offset, bl.size))
            .collect();
        assert_eq!(free, vec![(0, 16), (32, 32)]);
        buddy.free(b.id).unwrap();
        // Now everything merges back to one block.
        assert_eq!(buddy.table().blocks().len(), 1);
        assert!(buddy.table().blocks()[0].is_free());
        assert!(buddy.invariants_hold());
    }

    #[test]
    fn test_merge_cascades_multiple_orders() {
        let mut buddy = BuddyAllocator::new(64).unwrap();
        let a = buddy.malloc(16).unwrap(); // [0,16)
        let b = buddy.malloc(16).unwrap(); // [16,32)
        let c = buddy.malloc(32).unwrap(); // [32,64)
        buddy.free(b.id).unwrap();
        buddy.free(c.id).unwrap();
        buddy.free(a.id).unwrap();
        assert_eq!(buddy.table().blocks().len(), 1);
        assert_eq!(buddy.table().blocks()[0].size, 64);
    }

    #[test]
    fn test_allocations_prefer_lowest_offset() {
        let mut buddy = BuddyAllocator::new(128).unwrap();
        let a = buddy.malloc(32).unwrap();
        let b = buddy.malloc(32).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 32);
        buddy.free(a.id).unwrap();
        let c = buddy.malloc(32).unwrap();
        assert_eq!(c.offset, 0);
        assert_ne!(c.id, a.id);
    }

    #[test]
    fn test_out_of_memory_leaves_table_unchanged() {
        let mut buddy = BuddyAllocator::new(128).unwrap();
        buddy.malloc(64).unwrap();
        buddy.malloc(64).unwrap();
        let before = buddy.table().blocks().to_vec();
        let err = buddy.malloc(1).unwrap_err();
        assert_eq!(err, SimError::OutOfMemory { requested: 1 });
        assert_eq!(buddy.table().blocks(), &before[..]);

        // Oversized request fails even on an empty arena.
        let mut fresh = BuddyAllocator::new(128).unwrap();
        assert!(fresh.malloc(129).is_err());
        assert_eq!(fresh.table().blocks().len(), 1);
    }

    #[test]
    fn test_huge_init_size_is_rejected() {
        // (1 << 63) + 1 has no representable power-of-two rounding.
        let err = BuddyAllocator::new((1usize << 63) + 1).unwrap_err();
        assert_eq!(err.tag(), "BAD_ARGUMENT");
        assert_eq!(BuddyAllocator::new(1usize << 63).unwrap().capacity(), 1 << 63);
    }

    #[test]
    fn test_huge_malloc_reports_out_of_memory() {
        let mut buddy = BuddyAllocator::new(64).unwrap();
        let err = buddy.malloc((1usize << 63) + 1).unwrap_err();
        assert_eq!(
            err,
            SimError::OutOfMemory { requested: (1usize << 63) + 1 }
        );
        assert_eq!(buddy.table().blocks().len(), 1);
        assert_eq!(buddy.stats().failures, 1);
    }

    #[test]
    fn test_exhausted_scan_at_max_order_does_not_wrap() {
        // Fill a 2^63-byte arena so the order scan runs all the way to
        // the top order and finds nothing.
        let mut buddy = BuddyAllocator::new(1usize << 63).unwrap();
        let a = buddy.malloc(1usize << 62).unwrap();
        let b = buddy.malloc(1usize << 62).unwrap();
        assert_eq!(
            buddy.malloc(1).unwrap_err(),
            SimError::OutOfMemory { requested: 1 }
        );
        buddy.free(a.id).unwrap();
        buddy.free(b.id).unwrap();
        assert_eq!(buddy.table().blocks().len(), 1);
    }

    #[test]
    fn test_free_invalid_and_double_free() {
        let mut buddy = BuddyAllocator::new(64).unwrap();
        let p = buddy.malloc(8).unwrap();
        assert_eq!(buddy.free(42).unwrap_err(), SimError::InvalidId(42));
        buddy.free(p.id).unwrap();
        assert_eq!(buddy.free(p.id).unwrap_err(), SimError::InvalidId(p.id));
    }

    #[test]
    fn test_internal_fragmentation_tracks_live_blocks() {
        let mut buddy = BuddyAllocator::new(256).unwrap();
        let a = buddy.malloc(40).unwrap(); // 64 - 40 = 24
        let b = buddy.malloc(100).unwrap(); // 128 - 100 = 28
        assert_eq!(buddy.internal_fragmentation(), 52);
        buddy.free(a.id).unwrap();
        assert_eq!(buddy.internal_fragmentation(), 28);
        buddy.free(b.id).unwrap();
        assert_eq!(buddy.internal_fragmentation(), 0);
    }

    #[test]
    fn test_invariants_under_mixed_traffic() {
        let mut buddy = BuddyAllocator::new(1024).unwrap();
        let mut live = Vec::new();
        for size in [3, 17, 64, 100, 200, 5, 33] {
            if let Ok(p) = buddy.malloc(size) {
                assert!(p.size.is_power_of_two());
                assert!(p.size >= size);
                assert_eq!(p.offset % p.size, 0);
                live.push(p.id);
            }
            assert!(buddy.invariants_hold());
        }
        for id in live {
            buddy.free(id).unwrap();
            assert!(buddy.invariants_hold());
        }
        assert_eq!(buddy.table().blocks().len(), 1);
    }
}
