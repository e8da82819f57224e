//! Camera Masks
//!
//! Bitmask selecting which scene nodes a pass camera renders.

use serde::{Deserialize, Serialize};

/// Which nodes a camera renders
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraMask(u32);

impl Default for CameraMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl CameraMask {
    /// Nothing
    pub const NONE: Self = Self(0);

    /// Regular geometry
    pub const MAIN: Self = Self(1 << 0);

    /// Shadow casters
    pub const SHADOW: Self = Self(1 << 1);

    /// Selectable geometry (selector output)
    pub const SELECTOR: Self = Self(1 << 2);

    /// Everything
    pub const ALL: Self = Self(u32::MAX);

    /// Application-defined bit `n` (0..16)
    pub const fn custom(n: u8) -> Self {
        Self(1 << (16 + (n as u32 & 15)))
    }

    /// Create a mask from raw bits
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if all bits of `other` are set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any bit of `other` is set
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl core::ops::BitOr for CameraMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for CameraMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::ops::BitAnd for CameraMask {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_ops() {
        let mask = CameraMask::MAIN | CameraMask::SELECTOR;
        assert!(mask.contains(CameraMask::MAIN));
        assert!(!mask.contains(CameraMask::SHADOW));
        assert!(mask.intersects(CameraMask::SELECTOR | CameraMask::SHADOW));
        assert_eq!(mask.difference(CameraMask::MAIN), CameraMask::SELECTOR);
        assert!((mask & CameraMask::SHADOW).is_empty());
    }

    #[test]
    fn test_custom_bits() {
        assert_eq!(CameraMask::custom(0).bits(), 1 << 16);
        assert_eq!(CameraMask::custom(15).bits(), 1 << 31);
        assert!(CameraMask::ALL.contains(CameraMask::custom(3)));
        assert_eq!(CameraMask::default(), CameraMask::ALL);
    }
}
