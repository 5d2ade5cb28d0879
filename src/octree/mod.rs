//! Module `octree`
//!
//! The sparse voxel octree itself: a node pool, a voxel pool, and the
//! traversal that walks a Morton-style descent through both. See
//! [`Octree`] for the full surface.

mod spatial;

pub use spatial::SpatialVoxel;

use glam::UVec3;

use crate::memory::BlockPool;
use crate::node::{Node, MAX_ALLOWED_DEPTH};
use crate::voxel::Voxel;
use crate::width::MortonWidth;

/// Location of a node at some depth `d >= 1`: the node-pool block holding
/// it, and the octant within that block.
#[derive(Debug, Clone, Copy, Default)]
struct TraceStep {
    container_block: u32,
    octant: u8,
}

/// The path walked by [`Octree::get_traced`], recording enough to undo a
/// single allocation without re-descending from the root.
///
/// `steps[d]` (for `d` in `1..=depth_reached`) locates the node at depth
/// `d`; depth 0 (the root) needs no entry since it is always
/// [`Octree::root`]. `voxel_octant` is the final selection into the
/// voxel-pool block owned by the node at `depth_reached`.
#[derive(Debug, Clone, Copy)]
pub struct TracePath {
    steps: [TraceStep; MAX_ALLOWED_DEPTH],
    depth_reached: u8,
    voxel_octant: u8,
}

impl TracePath {
    /// Depth of the voxel-parent node this trace bottomed out at.
    #[must_use]
    pub const fn depth_reached(&self) -> u8 {
        self.depth_reached
    }

    /// Octant the traced voxel occupies within its parent's voxel block.
    #[must_use]
    pub const fn voxel_octant(&self) -> u8 {
        self.voxel_octant
    }
}

/// Computes the child octant a voxel falls into under `node_position`, the
/// node's position at `node_extent`, together with the child's own
/// position and whether `mask` already marks that octant present.
///
/// This is the one traversal primitive shared by every descent (`alloc`,
/// `get`, `get_traced`): each step halves the extent and either confirms or
/// creates the next level down.
#[must_use]
#[inline(always)]
fn child_octant(
    node_position: UVec3,
    voxel_transformed: UVec3,
    node_extent: u32,
    mask: u8,
) -> (usize, UVec3, bool) {
    let node_transformed = node_position * 2;
    let dist = voxel_transformed - node_transformed;
    let cell = dist / node_extent;
    let octant = ((cell.x << 2) | (cell.y << 1) | cell.z) as usize;
    let next_node_position = node_position + cell * (node_extent / 2);
    let exists = (mask & (1 << octant)) != 0;
    (octant, next_node_position, exists)
}

/// A sparse voxel octree over a cubic (or near-cubic) bounded region.
///
/// `W` selects the Morton key width ([`crate::width::Morton16`] or
/// [`crate::width::Morton32`]), `V` the payload type (defaulting to
/// [`crate::voxel::VoxelRecord`]), and `DISCARD_OVERFLOW` whether
/// out-of-bounds writes are silently dropped (`true`) or treated as a
/// precondition violation (`false`, the default — caught by a debug
/// assertion, a no-op past it).
///
/// Nodes live in a node pool; every node above the voxel-parent level
/// indexes another node-pool block, and every voxel-parent node (depth
/// `MAX_DEPTH - 1`) indexes a voxel-pool block instead. The root itself is
/// a standalone field, never pool-allocated, and its block is never
/// reclaimed even once empty.
pub struct Octree<W, V = crate::voxel::VoxelRecord, const DISCARD_OVERFLOW: bool = false>
where
    W: MortonWidth,
    V: Voxel,
{
    root: Node,
    node_pool: BlockPool<Node>,
    voxel_pool: BlockPool<V>,
    bounds: UVec3,
    max_depth: u32,
    axis_width: u32,
    _width: std::marker::PhantomData<W>,
}

impl<W, V, const DISCARD_OVERFLOW: bool> Octree<W, V, DISCARD_OVERFLOW>
where
    W: MortonWidth,
    V: Voxel,
{
    /// Builds an empty octree addressing `bounds.{x,y,z}` voxels per axis.
    ///
    /// A `0` component is replaced by `W::ABSOLUTE_AXIS_WIDTH`; any other
    /// component is clamped to that same ceiling. `MAX_DEPTH` is then
    /// `max(3, floor(log2(max(bounds))))` — callers after full use of the
    /// configured width should stick to power-of-two bounds, matching every
    /// worked example in this crate's tests.
    #[must_use]
    pub fn new(bounds: (u32, u32, u32)) -> Self {
        let ceiling = W::ABSOLUTE_AXIS_WIDTH;
        let clamp = |b: u32| if b == 0 { ceiling } else { b.min(ceiling) };
        let bounds = UVec3::new(clamp(bounds.0), clamp(bounds.1), clamp(bounds.2));

        let max_dim = bounds.x.max(bounds.y).max(bounds.z).max(1);
        let log2_floor = 31 - max_dim.leading_zeros();
        let max_depth = log2_floor.max(3);
        let axis_width = 1u32 << max_depth;

        let mut node_pool = BlockPool::new();
        let root_block = node_pool.alloc();

        Self {
            root: Node::new(0, root_block),
            node_pool,
            voxel_pool: BlockPool::new(),
            bounds,
            max_depth,
            axis_width,
            _width: std::marker::PhantomData,
        }
    }

    /// The configured per-axis bounds.
    #[must_use]
    pub const fn bounds(&self) -> (u32, u32, u32) {
        (self.bounds.x, self.bounds.y, self.bounds.z)
    }

    /// The effective tree depth, `max(3, floor(log2(max(bounds))))`.
    #[must_use]
    pub const fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// `2^max_depth()`: the side length of the addressable lattice.
    #[must_use]
    pub const fn axis_width(&self) -> u32 {
        self.axis_width
    }

    /// Total live bytes held across both pools, including the root and
    /// the octree header itself.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.node_pool.live_count() * std::mem::size_of::<crate::memory::Block<Node>>()
            + self.voxel_pool.live_count() * std::mem::size_of::<crate::memory::Block<V>>()
    }

    /// Number of live node-pool blocks, including the root's own
    /// (permanently live, never reclaimed) block.
    #[must_use]
    pub fn node_block_count(&self) -> usize {
        self.node_pool.live_count()
    }

    /// Number of live voxel-pool blocks.
    #[must_use]
    pub fn voxel_block_count(&self) -> usize {
        self.voxel_pool.live_count()
    }

    #[must_use]
    #[inline]
    fn out_of_bounds(&self, position: UVec3) -> bool {
        position.x >= self.bounds.x || position.y >= self.bounds.y || position.z >= self.bounds.z
    }

    /// Mutably borrows the node at `depth` given a trace's steps: the root
    /// for depth 0, otherwise the node-pool entry the matching step names.
    #[inline]
    fn node_at_mut(&mut self, steps: &[TraceStep; MAX_ALLOWED_DEPTH], depth: u32) -> &mut Node {
        if depth == 0 {
            &mut self.root
        } else {
            let step = steps[depth as usize];
            &mut self.node_pool.block_mut(step.container_block)[step.octant as usize]
        }
    }

    /// Writes `payload` at `position`, materialising any intermediate
    /// nodes that do not yet exist.
    ///
    /// Out-of-bounds positions are silently discarded when
    /// `DISCARD_OVERFLOW` is `true`; otherwise the call is a precondition
    /// violation, caught by a debug assertion (a release build instead
    /// falls through into the descent, which will itself panic on an
    /// out-of-range octant rather than corrupt memory).
    pub fn alloc(&mut self, position: (u32, u32, u32), payload: V) {
        let position = UVec3::new(position.0, position.1, position.2);
        if self.out_of_bounds(position) {
            if DISCARD_OVERFLOW {
                return;
            }
            debug_assert!(
                false,
                "position {position:?} exceeds bounds {:?}",
                self.bounds
            );
        }

        let voxel_transformed = position * 2;
        let mut node_position = UVec3::ZERO;

        #[derive(Clone, Copy)]
        enum Loc {
            Root,
            In(u32, u8),
        }

        let mut loc = Loc::Root;
        let current = |this: &Self, loc: Loc| -> Node {
            match loc {
                Loc::Root => this.root,
                Loc::In(block, octant) => this.node_pool.block(block)[octant as usize],
            }
        };

        for depth in 0..(self.max_depth - 2) {
            let node_extent = self.axis_width >> depth;
            let node = current(self, loc);
            let (octant, next_position, exists) =
                child_octant(node_position, voxel_transformed, node_extent, node.mask);

            match loc {
                Loc::Root => self.root.set_child(octant as u8),
                Loc::In(block, o) => {
                    self.node_pool.block_mut(block)[o as usize].set_child(octant as u8);
                }
            }
            let container_block = current(self, loc).block_index;

            if !exists {
                let reserved = self.node_pool.acquire_next_index();
                self.node_pool.block_mut(container_block)[octant] =
                    Node::new(depth as u8 + 1, reserved);
                self.node_pool.alloc();
                log::trace!("octree: grew node pool for depth {}", depth + 1);
            }

            loc = Loc::In(container_block, octant as u8);
            node_position = next_position;
        }

        // Voxel-octant level: the node one above the voxel-parent, whose
        // children (the voxel-parent nodes) still live in the node pool.
        {
            let depth = self.max_depth - 2;
            let node_extent = self.axis_width >> depth;
            let node = current(self, loc);
            let (octant, next_position, exists) =
                child_octant(node_position, voxel_transformed, node_extent, node.mask);

            match loc {
                Loc::Root => self.root.set_child(octant as u8),
                Loc::In(block, o) => {
                    self.node_pool.block_mut(block)[o as usize].set_child(octant as u8);
                }
            }
            let container_block = current(self, loc).block_index;

            if !exists {
                let reserved = self.voxel_pool.acquire_next_index();
                self.node_pool.block_mut(container_block)[octant] =
                    Node::new(depth as u8 + 1, reserved);
                self.voxel_pool.alloc();
                log::trace!("octree: grew voxel pool for depth {}", depth + 1);
            }

            loc = Loc::In(container_block, octant as u8);
            node_position = next_position;
        }

        // Final write into the voxel-parent's voxel block.
        {
            let depth = self.max_depth - 1;
            let node_extent = self.axis_width >> depth;
            let node = current(self, loc);
            let (octant, _next_position, _exists) =
                child_octant(node_position, voxel_transformed, node_extent, node.mask);

            match loc {
                Loc::Root => self.root.set_child(octant as u8),
                Loc::In(block, o) => {
                    self.node_pool.block_mut(block)[o as usize].set_child(octant as u8);
                }
            }
            let voxel_block = current(self, loc).block_index;
            self.voxel_pool.block_mut(voxel_block)[octant] = payload;
        }
    }

    /// Bulk-inserts `voxels`, decoding each one's Morton key and deferring
    /// to [`Self::alloc`]. Order is unspecified; callers wanting better
    /// cache behaviour should pre-sort `voxels` by Morton key themselves.
    pub fn alloc_bulk<I>(&mut self, voxels: I)
    where
        I: IntoIterator<Item = SpatialVoxel<V>>,
    {
        for voxel in voxels {
            self.alloc(voxel.decode_position(), voxel.payload());
        }
    }

    /// Reads the payload at `position`, or `None` if no voxel has been
    /// allocated there.
    #[must_use]
    pub fn get(&self, position: (u32, u32, u32)) -> Option<&V> {
        let position = UVec3::new(position.0, position.1, position.2);
        if self.out_of_bounds(position) {
            if DISCARD_OVERFLOW {
                return None;
            }
            debug_assert!(
                false,
                "position {position:?} exceeds bounds {:?}",
                self.bounds
            );
        }

        let voxel_transformed = position * 2;
        let mut node = self.root;
        let mut node_position = UVec3::ZERO;

        for depth in 0..(self.max_depth - 1) {
            let node_extent = self.axis_width >> depth;
            let (octant, next_position, exists) =
                child_octant(node_position, voxel_transformed, node_extent, node.mask);
            if !exists {
                return None;
            }
            node = self.node_pool.block(node.block_index)[octant];
            node_position = next_position;
        }

        let depth = self.max_depth - 1;
        let node_extent = self.axis_width >> depth;
        let (octant, _next_position, exists) =
            child_octant(node_position, voxel_transformed, node_extent, node.mask);
        if !exists {
            return None;
        }
        Some(&self.voxel_pool.block(node.block_index)[octant])
    }

    /// Like [`Self::get`], but also returns the descent path so a
    /// subsequent [`Self::dealloc`] can retrace it without walking from the
    /// root again.
    #[must_use]
    pub fn get_traced(&self, position: (u32, u32, u32)) -> Option<TracePath> {
        let position = UVec3::new(position.0, position.1, position.2);
        if self.out_of_bounds(position) {
            return None;
        }

        let voxel_transformed = position * 2;
        let mut node = self.root;
        let mut node_position = UVec3::ZERO;
        let mut steps = [TraceStep::default(); MAX_ALLOWED_DEPTH];

        for depth in 0..(self.max_depth - 1) {
            let node_extent = self.axis_width >> depth;
            let (octant, next_position, exists) =
                child_octant(node_position, voxel_transformed, node_extent, node.mask);
            if !exists {
                return None;
            }
            steps[(depth + 1) as usize] = TraceStep {
                container_block: node.block_index,
                octant: octant as u8,
            };
            node = self.node_pool.block(node.block_index)[octant];
            node_position = next_position;
        }

        let depth = self.max_depth - 1;
        let node_extent = self.axis_width >> depth;
        let (octant, _next_position, exists) =
            child_octant(node_position, voxel_transformed, node_extent, node.mask);
        if !exists {
            return None;
        }

        Some(TracePath {
            steps,
            depth_reached: depth as u8,
            voxel_octant: octant as u8,
        })
    }

    /// Removes the voxel at `position`, reclaiming every block that becomes
    /// empty as a result — up to, but never including, the root's own
    /// block. Returns whether a voxel was actually present.
    pub fn dealloc(&mut self, position: (u32, u32, u32)) -> bool {
        let position_vec = UVec3::new(position.0, position.1, position.2);
        if self.out_of_bounds(position_vec) {
            if DISCARD_OVERFLOW {
                return false;
            }
            debug_assert!(
                false,
                "position {position_vec:?} exceeds bounds {:?}",
                self.bounds
            );
            return false;
        }

        let Some(trace) = self.get_traced(position) else {
            return false;
        };

        let mut depth = u32::from(trace.depth_reached);
        let voxel_parent_block_index;
        {
            let node = self.node_at_mut(&trace.steps, depth);
            node.clear_child(trace.voxel_octant);
            if node.mask != 0 {
                return true;
            }
            voxel_parent_block_index = node.block_index;
        }

        self.voxel_pool.dealloc(voxel_parent_block_index);

        loop {
            let octant_here = trace.steps[depth as usize].octant;
            depth -= 1;
            let parent = self.node_at_mut(&trace.steps, depth);
            parent.clear_child(octant_here);

            if depth == 0 || parent.mask != 0 {
                break;
            }

            let block_to_free = parent.block_index;
            self.node_pool.dealloc(block_to_free);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::width::{Morton16, Morton32};

    type TestOctree = Octree<Morton32, u32>;

    #[test]
    fn new_computes_power_of_two_bounds() {
        let tree = TestOctree::new((64, 64, 64));
        assert_eq!(tree.max_depth(), 6);
        assert_eq!(tree.axis_width(), 64);
        assert_eq!(tree.bounds(), (64, 64, 64));
    }

    #[test]
    fn zero_bound_component_uses_absolute_width() {
        let tree: Octree<Morton16, u32> = Octree::new((0, 8, 8));
        assert_eq!(tree.bounds().0, Morton16::ABSOLUTE_AXIS_WIDTH);
    }

    #[test]
    fn min_depth_is_three() {
        let tree = TestOctree::new((2, 2, 2));
        assert_eq!(tree.max_depth(), 3);
    }

    #[test]
    fn alloc_then_get_round_trips() {
        let mut tree = TestOctree::new((32, 32, 32));
        tree.alloc((1, 2, 3), 42);
        assert_eq!(tree.get((1, 2, 3)), Some(&42));
    }

    #[test]
    fn get_on_empty_tree_is_none() {
        let tree = TestOctree::new((32, 32, 32));
        assert_eq!(tree.get((1, 2, 3)), None);
    }

    #[test]
    fn overwrite_replaces_payload() {
        let mut tree = TestOctree::new((32, 32, 32));
        tree.alloc((5, 5, 5), 1);
        tree.alloc((5, 5, 5), 2);
        assert_eq!(tree.get((5, 5, 5)), Some(&2));
    }

    #[test]
    fn dealloc_removes_voxel() {
        let mut tree = TestOctree::new((32, 32, 32));
        tree.alloc((1, 1, 1), 9);
        assert!(tree.dealloc((1, 1, 1)));
        assert_eq!(tree.get((1, 1, 1)), None);
    }

    #[test]
    fn dealloc_missing_voxel_returns_false() {
        let mut tree = TestOctree::new((32, 32, 32));
        assert!(!tree.dealloc((1, 1, 1)));
    }

    #[test]
    fn dealloc_does_not_disturb_siblings() {
        let mut tree = TestOctree::new((32, 32, 32));
        tree.alloc((0, 0, 0), 1);
        tree.alloc((31, 31, 31), 2);
        assert!(tree.dealloc((0, 0, 0)));
        assert_eq!(tree.get((0, 0, 0)), None);
        assert_eq!(tree.get((31, 31, 31)), Some(&2));
    }

    #[test]
    fn many_voxels_survive_a_full_fill_and_drain() {
        let mut tree = TestOctree::new((16, 16, 16));
        let mut positions = Vec::new();
        for x in 0..16u32 {
            for y in 0..16u32 {
                for z in 0..16u32 {
                    positions.push((x, y, z));
                }
            }
        }

        for (i, &p) in positions.iter().enumerate() {
            tree.alloc(p, i as u32);
        }
        for (i, &p) in positions.iter().enumerate() {
            assert_eq!(tree.get(p), Some(&(i as u32)));
        }
        for &p in &positions {
            assert!(tree.dealloc(p));
        }
        for &p in &positions {
            assert_eq!(tree.get(p), None);
        }
    }

    #[test]
    fn dealloc_reclaims_blocks_down_to_but_not_including_root() {
        let mut tree = TestOctree::new((32, 32, 32));
        assert_eq!(tree.node_block_count(), 1);
        assert_eq!(tree.voxel_block_count(), 0);

        tree.alloc((0, 0, 0), 1);
        assert!(tree.node_block_count() > 1);
        assert_eq!(tree.voxel_block_count(), 1);

        assert!(tree.dealloc((0, 0, 0)));
        assert_eq!(tree.node_block_count(), 1);
        assert_eq!(tree.voxel_block_count(), 0);
    }

    #[test]
    fn full_drain_returns_pools_to_exactly_root_only() {
        let mut tree = TestOctree::new((16, 16, 16));
        let mut positions = Vec::new();
        for x in 0..16u32 {
            for y in 0..16u32 {
                for z in 0..16u32 {
                    positions.push((x, y, z));
                }
            }
        }

        for (i, &p) in positions.iter().enumerate() {
            tree.alloc(p, i as u32);
        }
        assert!(tree.node_block_count() > 1);
        assert!(tree.voxel_block_count() > 0);

        for &p in &positions {
            assert!(tree.dealloc(p));
        }
        assert_eq!(tree.node_block_count(), 1);
        assert_eq!(tree.voxel_block_count(), 0);
    }

    #[test]
    fn alloc_bulk_inserts_every_voxel() {
        let mut tree = TestOctree::new((32, 32, 32));
        let voxels = vec![
            SpatialVoxel::new((0, 0, 0), 10u32),
            SpatialVoxel::new((1, 0, 0), 20u32),
            SpatialVoxel::new((0, 1, 0), 30u32),
        ];
        tree.alloc_bulk(voxels);

        assert_eq!(tree.get((0, 0, 0)), Some(&10));
        assert_eq!(tree.get((1, 0, 0)), Some(&20));
        assert_eq!(tree.get((0, 1, 0)), Some(&30));
    }

    #[test]
    fn get_traced_reaches_voxel_parent_depth() {
        let mut tree = TestOctree::new((32, 32, 32));
        tree.alloc((3, 3, 3), 7);
        let trace = tree.get_traced((3, 3, 3)).expect("voxel exists");
        assert_eq!(trace.depth_reached(), (tree.max_depth() - 1) as u8);
    }

    #[test]
    fn discard_overflow_drops_out_of_range_writes() {
        let mut tree: Octree<Morton32, u32, true> = Octree::new((32, 32, 32));
        tree.alloc((100, 100, 100), 1);
        assert_eq!(tree.get((100, 100, 100)), None);
    }

    #[test]
    fn byte_size_grows_with_allocations() {
        let mut tree = TestOctree::new((32, 32, 32));
        let empty = tree.byte_size();
        tree.alloc((1, 1, 1), 1);
        assert!(tree.byte_size() > empty);
    }
}
