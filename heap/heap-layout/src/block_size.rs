use crate::{BLOCK_OVERHEAD, MIN_BLOCK_BYTES, PAYLOAD_ALIGN};
use core::fmt;

/// Align `value` upwards to `align` (must be a power of two).
#[inline]
const fn align_up(value: u32, align: u32) -> u32 {
    (value + (align - 1)) & !(align - 1)
}

/// The total size of one boundary-tagged block: header, payload, and footer.
///
/// Legal sizes are multiples of [`PAYLOAD_ALIGN`] and at least
/// [`MIN_BLOCK_BYTES`]; the constructor debug-asserts both.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockSize(u32);

impl BlockSize {
    /// The smallest legal block: a 4-byte header, an 8-byte payload that can
    /// carry a free-list link, and a 4-byte footer.
    pub const MIN: Self = Self(MIN_BLOCK_BYTES);

    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        debug_assert!(value % PAYLOAD_ALIGN == 0, "block size must be 8-aligned");
        debug_assert!(value >= MIN_BLOCK_BYTES, "block size below minimum");
        Self(value)
    }

    /// The block size needed to satisfy a payload request of `request` bytes:
    /// request plus tag overhead, rounded up to the alignment granule, and
    /// never below [`BlockSize::MIN`].
    ///
    /// Requests near `u32::MAX` saturate to the largest 8-aligned size
    /// instead of wrapping; such a block can never be carved or grown and the
    /// allocation fails downstream.
    #[inline]
    #[must_use]
    pub const fn for_payload(request: u32) -> Self {
        let padded = align_up_saturating(request.saturating_add(BLOCK_OVERHEAD));
        if padded < MIN_BLOCK_BYTES {
            Self::MIN
        } else {
            Self(padded)
        }
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

    /// Bytes available to the client: the block minus both tags.
    #[inline]
    #[must_use]
    pub const fn payload_bytes(self) -> u32 {
        self.0 - BLOCK_OVERHEAD
    }
}

/// [`align_up`] that clamps to the largest aligned `u32` instead of wrapping.
#[inline]
const fn align_up_saturating(value: u32) -> u32 {
    if value > u32::MAX - (PAYLOAD_ALIGN - 1) {
        u32::MAX & !(PAYLOAD_ALIGN - 1)
    } else {
        align_up(value, PAYLOAD_ALIGN)
    }
}

impl fmt::Debug for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockSize({})", self.0)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BlockSize> for u32 {
    #[inline]
    fn from(size: BlockSize) -> Self {
        size.as_u32()
    }
}
