//! # Segregated Free Lists
//!
//! Free blocks are threaded through eight singly-linked, LIFO lists, one per
//! size class. A block's class is `min(size / 64, 7)`: 64-byte bands with
//! everything of 448 bytes and up sharing the last class. The mapping is
//! deliberately coarse; the fit search advances to larger classes when a
//! class runs dry, so a misclassified band costs throughput, never
//! correctness.
//!
//! List traversal is encapsulated in [`FreeCursor`], which treats any link
//! that does not name a plausible payload as end-of-list. That keeps a stale
//! or corrupted link slot from walking the search out of the region.

use crate::block;
use heap_layout::HeapOffset;
use log::warn;

/// Number of size classes.
pub(crate) const CLASS_COUNT: usize = 8;

/// Width of one size-class band in bytes.
const CLASS_BAND: u32 = 64;

/// The size class for a block of `size` total bytes.
pub(crate) fn size_class(size: u32) -> usize {
    ((size / CLASS_BAND) as usize).min(CLASS_COUNT - 1)
}

/// Bounds-guarded traversal of one class list.
///
/// Yields payload offsets until the list ends or a link stops looking like a
/// payload of this region.
pub(crate) struct FreeCursor<'a> {
    bytes: &'a [u8],
    next: Option<HeapOffset>,
}

impl<'a> FreeCursor<'a> {
    pub(crate) fn new(bytes: &'a [u8], head: Option<HeapOffset>) -> Self {
        Self { bytes, next: head }
    }
}

impl Iterator for FreeCursor<'_> {
    type Item = HeapOffset;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|&p| block::payload_in_region(self.bytes, p))?;
        self.next = block::read_link(self.bytes, current);
        Some(current)
    }
}

/// The segregated table: one list head per size class.
///
/// The table lives in the allocator value, not in heap bytes; only the links
/// between free blocks are stored in the region itself.
pub(crate) struct SegTable {
    heads: [Option<HeapOffset>; CLASS_COUNT],
}

impl Default for SegTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SegTable {
    pub(crate) const fn new() -> Self {
        Self {
            heads: [None; CLASS_COUNT],
        }
    }

    /// The head of one class list.
    pub(crate) const fn head(&self, class: usize) -> Option<HeapOffset> {
        self.heads[class]
    }

    /// LIFO-insert the free block at `payload` into the class for its size.
    ///
    /// Pushing the block that is already at the head is tolerated: the link
    /// written then is end-of-list, never the block itself.
    pub(crate) fn push(&mut self, bytes: &mut [u8], payload: HeapOffset) {
        let class = size_class(block::block_size(bytes, payload));
        let link = self.heads[class].filter(|&head| head != payload);
        block::write_link(bytes, payload, link);
        self.heads[class] = Some(payload);
    }

    /// Unlink the block at `payload` from its class list.
    ///
    /// A block that is not on the list leaves the table untouched; that only
    /// happens when the region has been corrupted, so it is worth a warning.
    pub(crate) fn remove(&mut self, bytes: &mut [u8], payload: HeapOffset) {
        let class = size_class(block::block_size(bytes, payload));
        let mut prev = None;
        let mut found = false;
        for current in FreeCursor::new(bytes, self.heads[class]) {
            if current == payload {
                found = true;
                break;
            }
            prev = Some(current);
        }
        if !found {
            warn!("free block {payload} missing from class {class} list");
            return;
        }

        let next = block::read_link(bytes, payload);
        match prev {
            None => self.heads[class] = next,
            Some(prev) => block::write_link(bytes, prev, next),
        }
        block::write_link(bytes, payload, None);
    }

    /// First fit: the first free block of at least `want` bytes, searching
    /// the starting class and then every larger one.
    pub(crate) fn find_fit(&self, bytes: &[u8], want: u32) -> Option<HeapOffset> {
        for class in size_class(want)..CLASS_COUNT {
            let hit = FreeCursor::new(bytes, self.heads[class]).find(|&p| {
                block::block_size(bytes, p) >= want && !block::is_allocated(bytes, p)
            });
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{write_link, write_tags};

    /// Lay out `blocks` as `(payload, size)` pairs in a fresh region and
    /// tag them all free.
    fn region_with(len: usize, blocks: &[(u32, u32)]) -> Vec<u8> {
        let mut bytes = vec![0; len];
        for &(payload, size) in blocks {
            write_tags(&mut bytes, HeapOffset::new(payload), size, false);
        }
        bytes
    }

    #[test]
    fn class_mapping_uses_64_byte_bands() {
        assert_eq!(size_class(16), 0);
        assert_eq!(size_class(63), 0);
        assert_eq!(size_class(64), 1);
        assert_eq!(size_class(128), 2);
        assert_eq!(size_class(447), 6);
        assert_eq!(size_class(448), 7);
        assert_eq!(size_class(1 << 20), 7);
    }

    #[test]
    fn push_is_lifo_within_a_class() {
        let mut bytes = region_with(128, &[(8, 16), (24, 16), (40, 16)]);
        let mut table = SegTable::new();
        for payload in [8, 24, 40] {
            table.push(&mut bytes, HeapOffset::new(payload));
        }

        let order: Vec<u32> = FreeCursor::new(&bytes, table.head(0))
            .map(HeapOffset::as_u32)
            .collect();
        assert_eq!(order, [40, 24, 8]);
    }

    #[test]
    fn pushing_the_current_head_does_not_self_loop() {
        let mut bytes = region_with(64, &[(8, 16)]);
        let mut table = SegTable::new();
        let p = HeapOffset::new(8);
        table.push(&mut bytes, p);
        table.push(&mut bytes, p);

        let listed: Vec<HeapOffset> = FreeCursor::new(&bytes, table.head(0)).collect();
        assert_eq!(listed, [p]);
    }

    #[test]
    fn remove_handles_head_middle_and_tail() {
        let mut bytes = region_with(128, &[(8, 16), (24, 16), (40, 16)]);
        let mut table = SegTable::new();
        for payload in [8, 24, 40] {
            table.push(&mut bytes, HeapOffset::new(payload));
        }

        // middle of [40, 24, 8]
        table.remove(&mut bytes, HeapOffset::new(24));
        let order: Vec<u32> = FreeCursor::new(&bytes, table.head(0))
            .map(HeapOffset::as_u32)
            .collect();
        assert_eq!(order, [40, 8]);

        // tail
        table.remove(&mut bytes, HeapOffset::new(8));
        let order: Vec<u32> = FreeCursor::new(&bytes, table.head(0))
            .map(HeapOffset::as_u32)
            .collect();
        assert_eq!(order, [40]);

        // head
        table.remove(&mut bytes, HeapOffset::new(40));
        assert_eq!(table.head(0), None);
    }

    #[test]
    fn remove_from_empty_list_is_a_no_op() {
        let mut bytes = region_with(64, &[(8, 16)]);
        let mut table = SegTable::new();
        table.remove(&mut bytes, HeapOffset::new(8));
        assert_eq!(table.head(0), None);
    }

    #[test]
    fn fit_prefers_the_starting_class_then_advances() {
        // one 32-byte block in class 0, one 80-byte block in class 1
        let mut bytes = region_with(256, &[(8, 32), (48, 80)]);
        let mut table = SegTable::new();
        table.push(&mut bytes, HeapOffset::new(8));
        table.push(&mut bytes, HeapOffset::new(48));

        // fits in class 0
        assert_eq!(table.find_fit(&bytes, 24), Some(HeapOffset::new(8)));
        // too big for the class-0 block; found by advancing to class 1
        assert_eq!(table.find_fit(&bytes, 48), Some(HeapOffset::new(48)));
        // nothing anywhere is this large
        assert_eq!(table.find_fit(&bytes, 4096), None);
    }

    #[test]
    fn fit_skips_blocks_that_are_too_small_in_the_same_class() {
        let mut bytes = region_with(128, &[(8, 16), (24, 40)]);
        let mut table = SegTable::new();
        table.push(&mut bytes, HeapOffset::new(24));
        table.push(&mut bytes, HeapOffset::new(8));

        // head (16 bytes) is too small, the 40-byte block behind it fits
        assert_eq!(table.find_fit(&bytes, 32), Some(HeapOffset::new(24)));
    }

    #[test]
    fn cursor_stops_at_a_garbage_link() {
        let mut bytes = region_with(64, &[(8, 16), (24, 16)]);
        let mut table = SegTable::new();
        table.push(&mut bytes, HeapOffset::new(8));
        table.push(&mut bytes, HeapOffset::new(24));

        // corrupt the second hop to point far outside the region
        write_link(&mut bytes, HeapOffset::new(8), Some(HeapOffset::new(0x4000)));
        let listed: Vec<u32> = FreeCursor::new(&bytes, table.head(0))
            .map(HeapOffset::as_u32)
            .collect();
        assert_eq!(listed, [24, 8]);

        // and a fit probe over the same list terminates
        assert_eq!(table.find_fit(&bytes, 4096), None);
    }
}
