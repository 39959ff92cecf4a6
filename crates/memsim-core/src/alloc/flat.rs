//! Flat free-list allocator with selectable placement strategies.
//!
//! The arena is a contiguous tiling of blocks; `malloc` carves a used
//! block out of a free one under the active strategy and `free` flips
//! it back, coalescing with free neighbors. The tiling invariant holds
//! across every operation: blocks ordered by offset always cover
//! exactly `[0, total_size)`.

use super::{ArenaStats, Placement};
use crate::block::{Block, BlockId, BlockState, BlockTable};
use crate::error::SimError;

/// Placement strategy for the flat allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Lowest-offset free block that fits.
    #[default]
    FirstFit,
    /// Smallest free block that fits; ties go to the lowest offset.
    BestFit,
    /// Largest free block; ties go to the lowest offset.
    WorstFit,
}

impl Strategy {
    /// Parses a protocol strategy name.
    #[must_use]
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw {
            "first_fit" => Some(Self::FirstFit),
            "best_fit" => Some(Self::BestFit),
            "worst_fit" => Some(Self::WorstFit),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FirstFit => "first_fit",
            Self::BestFit => "best_fit",
            Self::WorstFit => "worst_fit",
        }
    }
}

/// Free-list allocator over a contiguous arena.
#[derive(Debug, Clone)]
pub struct FlatAllocator {
    table: BlockTable,
    strategy: Strategy,
    successes: u64,
    failures: u64,
}

impl FlatAllocator {
    /// Creates an allocator whose arena is one free block of `size`
    /// bytes, with the id counter reset and `first_fit` active.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            table: BlockTable::new(size),
            strategy: Strategy::default(),
            successes: 0,
            failures: 0,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Switches the placement strategy. Existing blocks are unaffected.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    #[must_use]
    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    /// Allocates `size` bytes under the active strategy.
    ///
    /// The matched free block is split: a fresh-id used block at its
    /// offset, and (when the match was larger than the request) a
    /// fresh-id free remainder immediately after. On failure the table
    /// is left untouched.
    pub fn malloc(&mut self, size: usize) -> Result<Placement, SimError> {
        let Some(index) = self.find_candidate(size) else {
            self.failures += 1;
            return Err(SimError::OutOfMemory { requested: size });
        };

        let matched = self.table.blocks()[index];
        let id = self.table.issue_id();
        let mut replacement = vec![Block::used(id, matched.offset, size)];
        if matched.size > size {
            let remainder_id = self.table.issue_id();
            replacement.push(Block {
                id: Some(remainder_id),
                offset: matched.offset + size,
                size: matched.size - size,
                state: BlockState::Free,
            });
        }
        self.table.splice(index..index + 1, replacement);
        self.successes += 1;

        Ok(Placement {
            id,
            offset: matched.offset,
            size,
        })
    }

    /// Releases the used block carrying `id`, coalescing with any free
    /// neighbor on either side. Returns the freed block's offset.
    pub fn free(&mut self, id: BlockId) -> Result<usize, SimError> {
        let index = self.table.find_used(id).ok_or(SimError::InvalidId(id))?;
        let freed = self.table.blocks()[index];

        let blocks = self.table.blocks();
        let lo = if index > 0 && blocks[index - 1].is_free() {
            index - 1
        } else {
            index
        };
        let hi = if index + 1 < blocks.len() && blocks[index + 1].is_free() {
            index + 1
        } else {
            index
        };

        // The merged block keeps the lowest-offset constituent's id;
        // the other ids are retired with their blocks.
        let merged = Block {
            id: blocks[lo].id,
            offset: blocks[lo].offset,
            size: blocks[lo..=hi].iter().map(|b| b.size).sum(),
            state: BlockState::Free,
        };
        self.table.splice(lo..hi + 1, vec![merged]);

        Ok(freed.offset)
    }

    /// Statistics snapshot for the `stats` command.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            total_bytes: self.table.total_size(),
            used_bytes: self.table.used_bytes(),
            free_bytes: self.table.free_bytes(),
            free_blocks: self.table.free_block_count(),
            largest_free: self.table.largest_free(),
            internal_fragmentation: None,
            successes: self.successes,
            failures: self.failures,
        }
    }

    fn find_candidate(&self, size: usize) -> Option<usize> {
        let fits = self
            .table
            .blocks()
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_free() && b.size >= size);

        match self.strategy {
            // Blocks are offset-ordered, so the first fit is the
            // lowest-offset fit and strict comparisons below break
            // ties toward the lowest offset.
            Strategy::FirstFit => fits.map(|(i, _)| i).next(),
            Strategy::BestFit => {
                let mut best: Option<(usize, usize)> = None;
                for (i, b) in fits {
                    if best.is_none_or(|(_, s)| b.size < s) {
                        best = Some((i, b.size));
                    }
                }
                best.map(|(i, _)| i)
            }
            Strategy::WorstFit => {
                let mut worst: Option<(usize, usize)> = None;
                for (i, b) in fits {
                    if worst.is_none_or(|(_, s)| b.size > s) {
                        worst = Some((i, b.size));
                    }
                }
                worst.map(|(i, _)| i)
            }
        }
    }
}
