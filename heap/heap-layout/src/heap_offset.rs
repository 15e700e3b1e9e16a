use crate::{BlockSize, PAYLOAD_ALIGN};
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// A byte position inside the heap region, measured from its first byte.
///
/// The region's first byte is offset 0 (`heap_lo`); its last valid byte is
/// `region length - 1` (`heap_hi`). Offsets are plain distances, so they stay
/// valid when the backing storage is moved or snapshotted.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HeapOffset(u32);

impl HeapOffset {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Whether this offset satisfies the payload alignment contract.
    #[inline]
    #[must_use]
    pub const fn is_payload_aligned(self) -> bool {
        self.0 % PAYLOAD_ALIGN == 0
    }
}

impl fmt::Debug for HeapOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapOffset(0x{:08X})", self.0)
    }
}

impl fmt::Display for HeapOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for HeapOffset {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<HeapOffset> for u32 {
    #[inline]
    fn from(offset: HeapOffset) -> Self {
        offset.as_u32()
    }
}

impl Add<u32> for HeapOffset {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for HeapOffset {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

impl Sub<u32> for HeapOffset {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: u32) -> Self::Output {
        Self(self.0 - rhs)
    }
}

/// Advancing a position by one whole block lands on the next block.
impl Add<BlockSize> for HeapOffset {
    type Output = Self;
    #[inline]
    fn add(self, rhs: BlockSize) -> Self::Output {
        Self(self.0 + rhs.as_u32())
    }
}

/// Retreating by one whole block lands on the previous block.
impl Sub<BlockSize> for HeapOffset {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: BlockSize) -> Self::Output {
        Self(self.0 - rhs.as_u32())
    }
}
