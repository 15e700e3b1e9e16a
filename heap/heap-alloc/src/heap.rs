//! # Allocator Frontend
//!
//! [`SegListAllocator`] ties the pieces together: it owns the heap segment
//! and the segregated table, and exposes the public allocate / free /
//! reallocate surface.
//!
//! ## Region shape
//!
//! ```text
//! offset 0: [ base pad (4B) | sentinel (16B, allocated) | block | block | ... ]
//! ```
//!
//! The 4-byte base pad rotates every block start to offset ≡ 4 (mod 8), which
//! puts every payload at offset ≡ 0 (mod 8). The sentinel is a permanently
//! allocated minimum block; its footer is what the first real block's
//! previous-neighbour probe reads, so that probe never touches unmanaged
//! bytes.
//!
//! ## Operation flow
//!
//! - `alloc`: round the request up to a block size, first-fit search the
//!   class lists, split when the leftover can stand alone as a block, and
//!   fall back to growing the segment.
//! - `free`: merge with free neighbours in both directions, then list the
//!   merged block.
//! - `realloc`: allocate, copy, free. Nothing clever.
//!
//! [`SegListAllocator::check`] walks the whole region and every class list
//! and reports the first violated structural invariant; the test suite runs
//! it after every mutating step.

use crate::block;
use crate::seg_list::{CLASS_COUNT, FreeCursor, SegTable, size_class};
use crate::segment::{HeapExhausted, HeapSegment};
use heap_layout::{BLOCK_OVERHEAD, BlockSize, HeapOffset, MIN_BLOCK_BYTES, PAYLOAD_ALIGN, TAG_BYTES};
use log::{debug, trace};

/// Bytes of padding ahead of the first block.
const BASE_PAD: u32 = 4;

/// Payload offset of the sentinel block.
const SENTINEL_PAYLOAD: HeapOffset = HeapOffset::new(BASE_PAD + TAG_BYTES);

/// A segregated-fit, boundary-tag allocator over a growable heap segment.
///
/// All positions handed out are [`HeapOffset`]s into the segment's byte
/// region; payloads are 8-byte aligned and at least 8 bytes long. The
/// allocator is single-threaded by construction: every operation takes
/// `&mut self` and there is no interior mutability.
pub struct SegListAllocator<H: HeapSegment> {
    segment: H,
    table: SegTable,
}

/// Error establishing the heap prefix at construction time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The segment refused the initial pad-plus-sentinel reservation.
    #[error("segment refused the initial reservation")]
    Exhausted(#[from] HeapExhausted),
    /// The segment was not empty when the allocator took it over.
    #[error("segment already contains {0} reserved bytes")]
    SegmentInUse(u32),
}

/// A structural invariant violation found by [`SegListAllocator::check`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// Header and footer of a block disagree.
    #[error("boundary tags disagree at {0}")]
    TagMismatch(HeapOffset),
    /// A block size below the minimum or off the 8-byte grid.
    #[error("illegal block size {size} at {payload}")]
    BadBlockSize { payload: HeapOffset, size: u32 },
    /// The block walk did not land exactly on the region end.
    #[error("block walk covers {walked} of {len} region bytes")]
    RegionNotTiled { walked: u32, len: u32 },
    /// Two neighbouring blocks are both free.
    #[error("adjacent free blocks at {0}")]
    AdjacentFreeBlocks(HeapOffset),
    /// The sentinel is missing, resized, or no longer allocated.
    #[error("sentinel block damaged")]
    SentinelDamaged,
    /// A class list names a block that is allocated, out of place, or sized
    /// for a different class.
    #[error("listed entry {payload} does not belong to class {class}")]
    BadListEntry { payload: HeapOffset, class: usize },
    /// A class list walk visited more entries than there are free blocks.
    #[error("class {class} list does not terminate")]
    ListCycle { class: usize },
    /// The class lists collectively name a different number of blocks than
    /// the region holds free.
    #[error("{listed} listed blocks for {free} free blocks")]
    ListCountMismatch { listed: usize, free: usize },
    /// A free block is reachable from the class lists a number of times
    /// other than exactly once.
    #[error("free block {payload} is listed {listings} times")]
    MislistedFreeBlock { payload: HeapOffset, listings: usize },
}

impl<H: HeapSegment> SegListAllocator<H> {
    /// Take over an empty segment and install the heap prefix.
    ///
    /// # Errors
    /// [`InitError::Exhausted`] if the segment cannot supply the initial 20
    /// bytes, [`InitError::SegmentInUse`] if it was not empty.
    pub fn new(mut segment: H) -> Result<Self, InitError> {
        let base = segment.sbrk(BASE_PAD + MIN_BLOCK_BYTES)?;
        if base.as_u32() != 0 {
            return Err(InitError::SegmentInUse(base.as_u32()));
        }

        let bytes = segment.bytes_mut();
        // the pad word doubles as a null "footer" for sentinel prev-probes
        block::write_word(bytes, 0, 0);
        block::write_tags(bytes, SENTINEL_PAYLOAD, MIN_BLOCK_BYTES, true);
        debug!("heap initialized, sentinel at {SENTINEL_PAYLOAD}");

        Ok(Self {
            segment,
            table: SegTable::new(),
        })
    }

    /// Allocate `size` payload bytes.
    ///
    /// Returns the 8-byte-aligned payload offset, or `None` when `size` is 0
    /// or the segment cannot grow to fit the request.
    pub fn alloc(&mut self, size: u32) -> Option<HeapOffset> {
        if size == 0 {
            return None;
        }
        let want = BlockSize::for_payload(size);

        if let Some(hit) = self.table.find_fit(self.segment.bytes(), want.as_u32()) {
            let total = block::block_size(self.segment.bytes(), hit);
            self.table.remove(self.segment.bytes_mut(), hit);

            let remainder = total - want.as_u32();
            if remainder >= MIN_BLOCK_BYTES {
                let bytes = self.segment.bytes_mut();
                block::write_tags(bytes, hit, want.as_u32(), true);
                let tail = hit + want;
                block::write_tags(bytes, tail, remainder, false);
                self.table.push(self.segment.bytes_mut(), tail);
                trace!("alloc {size} -> {hit} (split {total} = {want} + {remainder})");
            } else {
                block::write_tags(self.segment.bytes_mut(), hit, total, true);
                trace!("alloc {size} -> {hit} (whole {total}-byte block)");
            }
            return Some(hit);
        }

        let grown = self.grow(want)?;
        block::write_tags(self.segment.bytes_mut(), grown, want.as_u32(), true);
        trace!("alloc {size} -> {grown} (grown)");
        Some(grown)
    }

    /// [`alloc`](Self::alloc), with the payload's first `size` bytes zeroed.
    pub fn alloc_zeroed(&mut self, size: u32) -> Option<HeapOffset> {
        let payload = self.alloc(size)?;
        let start = payload.as_usize();
        self.segment.bytes_mut()[start..start + size as usize].fill(0);
        Some(payload)
    }

    /// Release the allocation at `payload`.
    ///
    /// `payload` must be a live allocation previously returned by this
    /// allocator; anything else leaves the heap in an unspecified state.
    pub fn free(&mut self, payload: HeapOffset) {
        let size = block::block_size(self.segment.bytes(), payload);
        trace!("free {payload} ({size} bytes)");
        self.coalesce(payload, size);
    }

    /// Resize the allocation at `payload` to `size` payload bytes.
    ///
    /// `None` for `payload` allocates afresh; a `size` of 0 frees and
    /// returns `None`. Otherwise the contents are copied into a new
    /// allocation, up to the smaller of the old and new payload sizes, and
    /// the old block is freed. On allocation failure the old block is left
    /// untouched and `None` is returned.
    pub fn realloc(&mut self, payload: Option<HeapOffset>, size: u32) -> Option<HeapOffset> {
        let Some(old) = payload else {
            return self.alloc(size);
        };
        if size == 0 {
            self.free(old);
            return None;
        }

        let new = self.alloc(size)?;
        let old_payload = block::block_size(self.segment.bytes(), old) - BLOCK_OVERHEAD;
        let carried = size.min(old_payload) as usize;
        let bytes = self.segment.bytes_mut();
        bytes.copy_within(old.as_usize()..old.as_usize() + carried, new.as_usize());
        self.free(old);
        trace!("realloc {old} -> {new} ({carried} bytes carried)");
        Some(new)
    }

    /// The payload bytes of the live allocation at `payload`.
    #[must_use]
    pub fn payload(&self, payload: HeapOffset) -> &[u8] {
        let len = block::block_size(self.segment.bytes(), payload) - BLOCK_OVERHEAD;
        &self.segment.bytes()[payload.as_usize()..payload.as_usize() + len as usize]
    }

    /// The payload bytes of the live allocation at `payload`, writable.
    #[must_use]
    pub fn payload_mut(&mut self, payload: HeapOffset) -> &mut [u8] {
        let len = block::block_size(self.segment.bytes(), payload) - BLOCK_OVERHEAD;
        let start = payload.as_usize();
        &mut self.segment.bytes_mut()[start..start + len as usize]
    }

    /// Total bytes currently under management, heap prefix included.
    #[must_use]
    pub fn region_len(&self) -> usize {
        self.segment.bytes().len()
    }

    /// Bytes held across all class lists.
    #[must_use]
    pub fn free_bytes(&self) -> u32 {
        let bytes = self.segment.bytes();
        (0..CLASS_COUNT)
            .flat_map(|class| FreeCursor::new(bytes, self.table.head(class)))
            .map(|p| block::block_size(bytes, p))
            .sum()
    }

    /// Number of blocks held across all class lists.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        let bytes = self.segment.bytes();
        (0..CLASS_COUNT)
            .flat_map(|class| FreeCursor::new(bytes, self.table.head(class)))
            .count()
    }

    /// Merge the newly freed block at `payload` with free neighbours and
    /// list the result.
    ///
    /// The freed block itself is on no list when this runs; only the
    /// neighbours being absorbed need unlinking.
    fn coalesce(&mut self, payload: HeapOffset, size: u32) {
        let bytes = self.segment.bytes();
        let prev = block::prev_payload(bytes, payload).filter(|&p| !block::is_allocated(bytes, p));
        let next = block::next_payload(bytes, payload).filter(|&n| !block::is_allocated(bytes, n));

        let mut start = payload;
        let mut total = size;
        if let Some(prev) = prev {
            total += block::block_size(self.segment.bytes(), prev);
            self.table.remove(self.segment.bytes_mut(), prev);
            start = prev;
        }
        if let Some(next) = next {
            total += block::block_size(self.segment.bytes(), next);
            self.table.remove(self.segment.bytes_mut(), next);
        }

        if total != size {
            trace!("coalesced {payload} into {start} ({total} bytes)");
        }
        block::write_tags(self.segment.bytes_mut(), start, total, false);
        self.table.push(self.segment.bytes_mut(), start);
    }

    /// Grow the segment by one block of `size` bytes and tag it free.
    ///
    /// The new block starts exactly at the old region end, so its payload
    /// keeps the 8-byte alignment cadence. The only caller is `alloc`, which
    /// immediately marks the block allocated.
    fn grow(&mut self, size: BlockSize) -> Option<HeapOffset> {
        match self.segment.sbrk(size.as_u32()) {
            Ok(old_end) => {
                let payload = old_end + TAG_BYTES;
                block::write_tags(self.segment.bytes_mut(), payload, size.as_u32(), false);
                trace!("segment grown by {size} bytes, new block at {payload}");
                Some(payload)
            }
            Err(err) => {
                trace!("segment growth refused: {err}");
                None
            }
        }
    }

    /// Verify every structural invariant of the region and the class lists.
    ///
    /// # Errors
    /// The first violation found, as a [`CheckError`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn check(&self) -> Result<(), CheckError> {
        let bytes = self.segment.bytes();
        let len = bytes.len() as u32;

        let sentinel = block::header(bytes, SENTINEL_PAYLOAD).ok_or(CheckError::SentinelDamaged)?;
        if sentinel.size_bytes() != MIN_BLOCK_BYTES || !sentinel.allocated() {
            return Err(CheckError::SentinelDamaged);
        }

        // One pass over the blocks: tag agreement, size legality, complete
        // coalescing, and exact tiling of the region.
        let mut walked = BASE_PAD;
        let mut free_blocks = 0_usize;
        let mut prev_free = false;
        let mut cursor = Some(SENTINEL_PAYLOAD);
        while let Some(payload) = cursor {
            let header =
                block::header(bytes, payload).ok_or(CheckError::RegionNotTiled { walked, len })?;
            let size = header.size_bytes();
            if size < MIN_BLOCK_BYTES || size % PAYLOAD_ALIGN != 0 {
                return Err(CheckError::BadBlockSize { payload, size });
            }
            let footer = block::footer(bytes, payload).ok_or(CheckError::TagMismatch(payload))?;
            if u32::from(footer) != u32::from(header) {
                return Err(CheckError::TagMismatch(payload));
            }

            let free = !header.allocated();
            if free && prev_free {
                return Err(CheckError::AdjacentFreeBlocks(payload));
            }
            free_blocks += usize::from(free);
            prev_free = free;
            walked += size;
            cursor = block::next_payload(bytes, payload);
        }
        if walked != len {
            return Err(CheckError::RegionNotTiled { walked, len });
        }

        // Each class list terminates and names only free blocks of its class.
        let mut listed = 0_usize;
        for class in 0..CLASS_COUNT {
            let mut steps = 0_usize;
            for payload in FreeCursor::new(bytes, self.table.head(class)) {
                if block::is_allocated(bytes, payload)
                    || size_class(block::block_size(bytes, payload)) != class
                {
                    return Err(CheckError::BadListEntry { payload, class });
                }
                steps += 1;
                if steps > free_blocks {
                    return Err(CheckError::ListCycle { class });
                }
            }
            listed += steps;
        }
        if listed != free_blocks {
            return Err(CheckError::ListCountMismatch {
                listed,
                free: free_blocks,
            });
        }

        // Each free block is reachable exactly once across all lists.
        let mut cursor = Some(SENTINEL_PAYLOAD);
        while let Some(payload) = cursor {
            if !block::is_allocated(bytes, payload) {
                let listings: usize = (0..CLASS_COUNT)
                    .map(|class| {
                        FreeCursor::new(bytes, self.table.head(class))
                            .filter(|&p| p == payload)
                            .count()
                    })
                    .sum();
                if listings != 1 {
                    return Err(CheckError::MislistedFreeBlock { payload, listings });
                }
            }
            cursor = block::next_payload(bytes, payload);
        }

        Ok(())
    }
}
