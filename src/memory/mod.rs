//! Arena allocation backing the octree's node and voxel storage.

#[cfg(feature = "memory_stats")]
mod allocator_stats;
mod pool;

#[cfg(feature = "memory_stats")]
pub use allocator_stats::AllocatorStats;
pub use pool::{Block, BlockPool, BLOCK_ARITY};
