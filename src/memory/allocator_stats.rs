//! Module `memory::allocator_stats`
//!
//! Lightweight bookkeeping for [`super::BlockPool`], exposed so callers can
//! report memory usage without walking the pool's internals.

/// Snapshot of a [`super::BlockPool`]'s occupancy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of blocks currently in use.
    pub allocated_blocks: usize,
    /// Number of blocks sitting on the free-list, available for reuse.
    pub free_blocks: usize,
    /// Size in bytes of a single 8-element block.
    pub block_size: usize,
}

impl AllocatorStats {
    /// Total number of blocks ever materialised, live or free.
    #[must_use]
    pub const fn total_blocks(&self) -> usize {
        self.allocated_blocks + self.free_blocks
    }

    /// Bytes currently held by live blocks (excludes free-list slack).
    #[must_use]
    pub const fn live_bytes(&self) -> usize {
        self.allocated_blocks * self.block_size
    }
}
