//! # Boundary-Tagged Block Layout
//!
//! Every block, free or allocated, is `[ header (4B) | payload | footer (4B) ]`
//! with identical header and footer tags. The tag word packs the total block
//! size (a multiple of 8, so its low three bits are free) together with the
//! allocated flag:
//!
//! ```text
//! bit  31 ............ 3   2 1   0
//!     [ size in 8B units | __ | A ]
//! ```
//!
//! Tags are interpreted bytes, not overlaid structures: all access goes
//! through little-endian `u32` reads and writes on the region's byte slice,
//! and every read is bounds-checked. A read that falls outside the region
//! reports "no block there" rather than panicking, which is what makes
//! neighbour traversal safe at both ends of the heap.
//!
//! For **free** blocks only, the first 4 payload bytes are the link slot:
//! the offset of the next free block in the same size class, with 0 (never a
//! payload; the heap prefix occupies it) meaning end of list.

use bitfield_struct::bitfield;
use heap_layout::{HeapOffset, PAYLOAD_ALIGN, TAG_BYTES};

/// One 4-byte boundary tag.
#[bitfield(u32)]
#[derive(PartialEq)]
pub(crate) struct BlockTag {
    /// Allocated flag (bit 0).
    pub allocated: bool,
    /// Reserved low bits (bits 1..=2), always zero.
    #[bits(2)]
    reserved: u8,
    /// Total block size in 8-byte units (bits 3..=31).
    #[bits(29)]
    pub size_units: u32,
}

impl BlockTag {
    /// Tag for a block of `size` total bytes (must be a multiple of 8).
    pub(crate) const fn for_block(size: u32, allocated: bool) -> Self {
        Self::new()
            .with_allocated(allocated)
            .with_size_units(size >> 3)
    }

    /// Total block size in bytes.
    pub(crate) const fn size_bytes(self) -> u32 {
        self.size_units() << 3
    }
}

/// Read the little-endian `u32` at byte index `at`, if fully inside `bytes`.
pub(crate) fn read_word(bytes: &[u8], at: usize) -> Option<u32> {
    let end = at.checked_add(TAG_BYTES as usize)?;
    let word = bytes.get(at..end)?;
    Some(u32::from_le_bytes(word.try_into().ok()?))
}

/// Write the little-endian `u32` at byte index `at`.
pub(crate) fn write_word(bytes: &mut [u8], at: usize, word: u32) {
    debug_assert!(
        at + TAG_BYTES as usize <= bytes.len(),
        "tag write outside the region"
    );
    if let Some(slot) = bytes.get_mut(at..at + TAG_BYTES as usize) {
        slot.copy_from_slice(&word.to_le_bytes());
    }
}

/// The header tag of the block whose payload starts at `payload`.
pub(crate) fn header(bytes: &[u8], payload: HeapOffset) -> Option<BlockTag> {
    let at = payload.as_usize().checked_sub(TAG_BYTES as usize)?;
    read_word(bytes, at).map(BlockTag::from)
}

/// The footer tag of the block whose payload starts at `payload`.
pub(crate) fn footer(bytes: &[u8], payload: HeapOffset) -> Option<BlockTag> {
    let size = block_size(bytes, payload) as usize;
    if size == 0 {
        return None;
    }
    let at = (payload.as_usize() + size).checked_sub(2 * TAG_BYTES as usize)?;
    read_word(bytes, at).map(BlockTag::from)
}

/// Total size of the block at `payload`, or 0 when no header is readable.
pub(crate) fn block_size(bytes: &[u8], payload: HeapOffset) -> u32 {
    header(bytes, payload).map_or(0, BlockTag::size_bytes)
}

/// Allocated flag of the block at `payload`.
///
/// Positions without a readable header count as allocated, so neighbour
/// probes beyond the region never look like mergeable free blocks.
pub(crate) fn is_allocated(bytes: &[u8], payload: HeapOffset) -> bool {
    header(bytes, payload).is_none_or(|tag| tag.allocated())
}

/// Stamp matching header and footer tags for the block at `payload`.
pub(crate) fn write_tags(bytes: &mut [u8], payload: HeapOffset, size: u32, allocated: bool) {
    let tag = BlockTag::for_block(size, allocated);
    write_word(bytes, payload.as_usize() - TAG_BYTES as usize, tag.into());
    write_word(
        bytes,
        payload.as_usize() + size as usize - 2 * TAG_BYTES as usize,
        tag.into(),
    );
}

/// Payload of the block following `payload`, if one exists inside the region.
pub(crate) fn next_payload(bytes: &[u8], payload: HeapOffset) -> Option<HeapOffset> {
    let size = block_size(bytes, payload);
    if size == 0 {
        return None;
    }
    let next = payload + size;
    header(bytes, next).map(|_| next)
}

/// Payload of the block preceding `payload`, located via that block's footer.
pub(crate) fn prev_payload(bytes: &[u8], payload: HeapOffset) -> Option<HeapOffset> {
    let at = payload.as_usize().checked_sub(2 * TAG_BYTES as usize)?;
    let size = read_word(bytes, at).map(BlockTag::from)?.size_bytes();
    if size == 0 {
        return None;
    }
    let prev = HeapOffset::new(payload.as_u32().checked_sub(size)?);
    // the earliest payload sits right behind the base pad and one header
    if prev.as_u32() < PAYLOAD_ALIGN {
        return None;
    }
    Some(prev)
}

/// Whether `offset` could be a payload of this region: aligned, behind at
/// least one header, and with its link slot fully readable.
pub(crate) fn payload_in_region(bytes: &[u8], offset: HeapOffset) -> bool {
    offset.is_payload_aligned()
        && offset.as_u32() >= PAYLOAD_ALIGN
        && offset.as_usize() + TAG_BYTES as usize <= bytes.len()
}

/// The link slot of a free block: offset of the next free block in its size
/// class, or `None` at the end of the list.
pub(crate) fn read_link(bytes: &[u8], payload: HeapOffset) -> Option<HeapOffset> {
    match read_word(bytes, payload.as_usize()) {
        None | Some(0) => None,
        Some(word) => Some(HeapOffset::new(word)),
    }
}

/// Store `link` in the link slot of the free block at `payload`.
pub(crate) fn write_link(bytes: &mut [u8], payload: HeapOffset, link: Option<HeapOffset>) {
    write_word(
        bytes,
        payload.as_usize(),
        link.map_or(0, HeapOffset::as_u32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A region of `len` zeroed bytes.
    fn region(len: usize) -> Vec<u8> {
        vec![0; len]
    }

    #[test]
    fn tag_word_packs_size_and_flag() {
        let tag = BlockTag::for_block(48, true);
        assert_eq!(u32::from(tag), 48 | 1);
        assert_eq!(tag.size_bytes(), 48);
        assert!(tag.allocated());

        let tag = BlockTag::for_block(1024, false);
        assert_eq!(u32::from(tag), 1024);
        assert!(!tag.allocated());
    }

    #[test]
    fn tags_round_trip_through_the_region() {
        let mut bytes = region(64);
        let payload = HeapOffset::new(8);
        write_tags(&mut bytes, payload, 24, true);

        assert_eq!(block_size(&bytes, payload), 24);
        assert!(is_allocated(&bytes, payload));
        assert_eq!(
            u32::from(header(&bytes, payload).unwrap()),
            u32::from(footer(&bytes, payload).unwrap())
        );
    }

    #[test]
    fn neighbour_traversal_walks_both_ways() {
        // [ pad | A: 16 @ 8 | B: 24 @ 24 | C: 16 @ 48 ]
        let mut bytes = region(60);
        let a = HeapOffset::new(8);
        let b = HeapOffset::new(24);
        let c = HeapOffset::new(48);
        write_tags(&mut bytes, a, 16, true);
        write_tags(&mut bytes, b, 24, false);
        write_tags(&mut bytes, c, 16, true);

        assert_eq!(next_payload(&bytes, a), Some(b));
        assert_eq!(next_payload(&bytes, b), Some(c));
        assert_eq!(next_payload(&bytes, c), None);

        assert_eq!(prev_payload(&bytes, c), Some(b));
        assert_eq!(prev_payload(&bytes, b), Some(a));
        // A's "previous footer" is the zeroed base pad
        assert_eq!(prev_payload(&bytes, a), None);
    }

    #[test]
    fn reads_outside_the_region_are_inert() {
        let bytes = region(16);
        let beyond = HeapOffset::new(64);
        assert_eq!(header(&bytes, beyond), None);
        assert_eq!(block_size(&bytes, beyond), 0);
        assert!(is_allocated(&bytes, beyond));
        assert_eq!(next_payload(&bytes, beyond), None);
        assert!(!payload_in_region(&bytes, beyond));
    }

    #[test]
    fn link_slot_uses_zero_as_end_of_list() {
        let mut bytes = region(32);
        let payload = HeapOffset::new(8);
        write_tags(&mut bytes, payload, 16, false);

        assert_eq!(read_link(&bytes, payload), None);
        write_link(&mut bytes, payload, Some(HeapOffset::new(24)));
        assert_eq!(read_link(&bytes, payload), Some(HeapOffset::new(24)));
        write_link(&mut bytes, payload, None);
        assert_eq!(read_link(&bytes, payload), None);
    }

    #[test]
    fn misaligned_or_early_offsets_are_not_payloads() {
        let bytes = region(64);
        assert!(!payload_in_region(&bytes, HeapOffset::new(0)));
        assert!(!payload_in_region(&bytes, HeapOffset::new(4)));
        assert!(!payload_in_region(&bytes, HeapOffset::new(12)));
        assert!(payload_in_region(&bytes, HeapOffset::new(8)));
        assert!(payload_in_region(&bytes, HeapOffset::new(56)));
    }
}
