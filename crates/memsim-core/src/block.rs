//! Block bookkeeping shared by both allocators.
//!
//! The simulated arena is tracked as an offset-ordered table of blocks
//! that always tiles `[0, total_size)` exactly: no gaps, no overlaps.
//! There are no parent/child or neighbor links; adjacency and buddy
//! relationships are derived from offsets, which keeps the structure a
//! plain indexed table.
//!
//! Ids identify blocks to the external client. They are issued
//! monotonically starting at 0 and never reused while a block holding
//! one is live. The arena-spanning free block created at `init` carries
//! no id; ids appear only once `malloc` starts carving blocks.

/// Externally-visible block identifier.
pub type BlockId = u64;

/// Free/used state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Used,
}

/// A contiguous region of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Client-visible id, if one has been issued for this block.
    pub id: Option<BlockId>,
    /// Starting offset in bytes.
    pub offset: usize,
    /// Extent in bytes (always > 0).
    pub size: usize,
    pub state: BlockState,
}

impl Block {
    /// A free block without an id.
    #[must_use]
    pub fn free(offset: usize, size: usize) -> Self {
        Self {
            id: None,
            offset,
            size,
            state: BlockState::Free,
        }
    }

    /// A used block with a fresh id.
    #[must_use]
    pub fn used(id: BlockId, offset: usize, size: usize) -> Self {
        Self {
            id: Some(id),
            offset,
            size,
            state: BlockState::Used,
        }
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.state == BlockState::Free
    }

    /// One past the last byte covered by this block.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Offset-ordered block table covering the whole arena.
#[derive(Debug, Clone)]
pub struct BlockTable {
    blocks: Vec<Block>,
    total_size: usize,
    next_id: BlockId,
}

impl BlockTable {
    /// Creates a table holding one unidentified free block spanning the
    /// arena, with the id counter reset.
    #[must_use]
    pub fn new(total_size: usize) -> Self {
        Self {
            blocks: vec![Block::free(0, total_size)],
            total_size,
            next_id: 0,
        }
    }

    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Blocks in ascending offset order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Index of the used block carrying `id`, if any.
    ///
    /// Free blocks are not addressable by id even when they still carry
    /// one from an earlier split, so `free` on such an id reports
    /// `INVALID_ID` just like an id that was never issued.
    #[must_use]
    pub fn find_used(&self, id: BlockId) -> Option<usize> {
        // Linear scan is fine at interactive block counts.
        self.blocks
            .iter()
            .position(|b| b.id == Some(id) && b.state == BlockState::Used)
    }

    /// Index of the free block at exactly (`offset`, `size`), if any.
    #[must_use]
    pub fn find_free_at(&self, offset: usize, size: usize) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.is_free() && b.offset == offset && b.size == size)
    }

    pub(crate) fn issue_id(&mut self) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Replaces the blocks at `range` with `with`, which must cover the
    /// same byte span in order.
    pub(crate) fn splice(&mut self, range: std::ops::Range<usize>, with: Vec<Block>) {
        debug_assert!(!with.is_empty());
        debug_assert_eq!(with.first().map(|b| b.offset), self.blocks.get(range.start).map(|b| b.offset));
        debug_assert_eq!(
            with.last().map(Block::end),
            range.end.checked_sub(1).and_then(|i| self.blocks.get(i)).map(Block::end)
        );
        self.blocks.splice(range, with);
    }

    /// Sum of used block sizes.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| !b.is_free())
            .map(|b| b.size)
            .sum()
    }

    /// Sum of free block sizes.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_free()).map(|b| b.size).sum()
    }

    /// Number of free blocks.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_free()).count()
    }

    /// Size of the largest free block, 0 when none.
    #[must_use]
    pub fn largest_free(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.is_free())
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Checks the tiling invariant: blocks cover `[0, total_size)` in
    /// ascending order with no gaps or overlaps.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 0;
        for block in &self.blocks {
            if block.offset != expected || block.size == 0 {
                return false;
            }
            expected = block.end();
        }
        expected == self.total_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_one_free_block() {
        let table = BlockTable::new(1024);
        assert_eq!(table.blocks().len(), 1);
        assert_eq!(table.blocks()[0], Block::free(0, 1024));
        assert!(table.is_contiguous());
        assert_eq!(table.free_bytes(), 1024);
        assert_eq!(table.used_bytes(), 0);
    }

    #[test]
    fn test_issue_id_monotonic_from_zero() {
        let mut table = BlockTable::new(64);
        assert_eq!(table.issue_id(), 0);
        assert_eq!(table.issue_id(), 1);
        assert_eq!(table.issue_id(), 2);
    }

    #[test]
    fn test_splice_preserves_tiling() {
        let mut table = BlockTable::new(100);
        table.splice(0..1, vec![Block::used(0, 0, 40), Block::free(40, 60)]);
        assert!(table.is_contiguous());
        assert_eq!(table.used_bytes(), 40);
        assert_eq!(table.largest_free(), 60);
        assert_eq!(table.find_used(0), Some(0));
        assert_eq!(table.find_free_at(40, 60), Some(1));
    }

    #[test]
    fn test_free_block_not_addressable_by_id() {
        let mut table = BlockTable::new(100);
        let mut reused = Block::used(3, 0, 100);
        reused.state = BlockState::Free;
        table.splice(0..1, vec![reused]);
        assert_eq!(table.find_used(3), None);
    }
}
