//! Module `width`
//!
//! Compile-time selection of the Morton key width: a sealed marker-type
//! trait plus two zero-sized marker types, so the choice is resolved at
//! monomorphisation time with no runtime branch.
//!
//! # Examples
//!
//! ```rust
//! use svoxel::width::{Morton16, Morton32, MortonWidth};
//!
//! assert_eq!(Morton16::ABSOLUTE_AXIS_WIDTH, 32);
//! assert_eq!(Morton32::ABSOLUTE_AXIS_WIDTH, 1024);
//! ```

mod sealed {
    pub trait Sealed {}
}

/// Selects the Morton key width for an [`crate::Octree`] instantiation.
///
/// Implemented only by [`Morton16`] and [`Morton32`]; the trait is sealed so
/// no third width can be added without also teaching the codec and octree
/// about it.
pub trait MortonWidth: sealed::Sealed + Copy + Clone + Send + Sync + 'static {
    /// Number of Morton bits available per axis (5 or 10).
    const AXIS_BITS: u32;

    /// Absolute per-axis coordinate bound this width can address, before
    /// any caller-supplied `bounds` clamp: `2^AXIS_BITS`.
    const ABSOLUTE_AXIS_WIDTH: u32 = 1 << Self::AXIS_BITS;

    /// Bitmask that keeps only the bits a key of this width can set.
    const KEY_MASK: u32 = (1 << (Self::AXIS_BITS * 3)) - 1;
}

/// 16-bit Morton keys: 5 bits per axis, addressing a 32³ lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Morton16;

impl sealed::Sealed for Morton16 {}
impl MortonWidth for Morton16 {
    const AXIS_BITS: u32 = 5;
}

/// 32-bit Morton keys: 10 bits per axis, addressing a 1024³ lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Morton32;

impl sealed::Sealed for Morton32 {}
impl MortonWidth for Morton32 {
    const AXIS_BITS: u32 = 10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morton16_bounds() {
        assert_eq!(Morton16::AXIS_BITS, 5);
        assert_eq!(Morton16::ABSOLUTE_AXIS_WIDTH, 32);
        assert_eq!(Morton16::KEY_MASK, 0x7FFF);
    }

    #[test]
    fn morton32_bounds() {
        assert_eq!(Morton32::AXIS_BITS, 10);
        assert_eq!(Morton32::ABSOLUTE_AXIS_WIDTH, 1024);
        assert_eq!(Morton32::KEY_MASK, 0x3FFF_FFFF);
    }
}
