//! Module `octree::spatial`
//!
//! [`SpatialVoxel`] pairs a Morton key with a payload; it is the input
//! element type accepted by [`super::Octree::alloc_bulk`].

use crate::codec::{decode, encode};
use crate::voxel::Voxel;

/// A Morton-keyed payload, ready for bulk insertion into an [`super::Octree`].
///
/// # Examples
///
/// ```rust
/// use svoxel::SpatialVoxel;
///
/// let sv = SpatialVoxel::new((1, 2, 3), 42u8);
/// assert_eq!(sv.decode_position(), (1, 2, 3));
/// assert_eq!(sv.payload(), 42);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SpatialVoxel<V: Voxel> {
    morton: u32,
    payload: V,
}

impl<V: Voxel> SpatialVoxel<V> {
    /// Builds a spatial voxel, encoding `position` into its Morton key.
    #[must_use]
    pub fn new(position: (u32, u32, u32), payload: V) -> Self {
        Self {
            morton: Self::encode_position(position),
            payload,
        }
    }

    /// Encodes a coordinate tuple into a Morton key.
    #[must_use]
    pub const fn encode_position(position: (u32, u32, u32)) -> u32 {
        encode(position.0, position.1, position.2)
    }

    /// Decodes this voxel's stored Morton key back into a coordinate tuple.
    #[must_use]
    pub const fn decode_position(&self) -> (u32, u32, u32) {
        decode(self.morton)
    }

    /// The raw Morton key.
    #[must_use]
    pub const fn morton(&self) -> u32 {
        self.morton
    }

    /// The payload to be written at the decoded position.
    #[must_use]
    pub const fn payload(&self) -> V {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_morton() {
        let sv = SpatialVoxel::new((5, 6, 7), 99u32);
        assert_eq!(sv.decode_position(), (5, 6, 7));
        assert_eq!(sv.payload(), 99);
    }
}
