//! # Heap Offsets and Block Sizes
//!
//! Strongly typed wrappers for positions and sizes inside a single contiguous
//! heap region.
//!
//! ## Overview
//!
//! The allocator never stores raw pointers. Every position is a byte offset
//! from the first byte of the managed region, and every block size is a
//! separate quantity with its own arithmetic. Two zero-cost wrappers around
//! `u32` keep the two from mixing:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HeapOffset`] | A byte position inside the region (the region starts at offset 0). |
//! | [`BlockSize`] | The total size of one boundary-tagged block, tags included. |
//!
//! Offsets make the region relocatable: the backing storage may move (or be
//! snapshotted) without invalidating any stored link, and a 32-bit offset fits
//! in the first word of the smallest possible payload regardless of pointer
//! width.
//!
//! ## Block geometry
//!
//! Every block is `[ header (4B) | payload (>= 8B) | footer (4B) ]`. The
//! constants below pin that geometry:
//!
//! - [`TAG_BYTES`] — one boundary tag (header or footer)
//! - [`BLOCK_OVERHEAD`] — header plus footer
//! - [`PAYLOAD_ALIGN`] — alignment contract for payload offsets
//! - [`MIN_BLOCK_BYTES`] — the smallest legal block (16 bytes)
//!
//! ## Typical Usage
//!
//! ```rust
//! # use heap_layout::*;
//! // A request for 24 payload bytes needs a 32-byte block.
//! let size = BlockSize::for_payload(24);
//! assert_eq!(size.as_u32(), 32);
//!
//! // Tiny requests are carried by the minimum block.
//! assert_eq!(BlockSize::for_payload(1), BlockSize::MIN);
//!
//! // Offsets advance by whole blocks.
//! let payload = HeapOffset::new(8);
//! assert_eq!((payload + size).as_u32(), 40);
//! assert!(payload.is_payload_aligned());
//! ```
//!
//! ## Design Notes
//!
//! - Both types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`,
//!   and `Hash`.
//! - All arithmetic is `const fn` and zero-cost in release builds.
//! - A `u32` offset bounds the region at 4 GiB, matching the 32-bit size
//!   field of the boundary tags.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod block_size;
mod heap_offset;

pub use block_size::BlockSize;
pub use heap_offset::HeapOffset;

/// Bytes in one boundary tag (header or footer).
pub const TAG_BYTES: u32 = 4;

/// Combined header-plus-footer overhead carried by every block.
pub const BLOCK_OVERHEAD: u32 = 2 * TAG_BYTES;

/// Alignment contract for payload offsets.
pub const PAYLOAD_ALIGN: u32 = 8;

/// Smallest legal block: header, an 8-byte payload, and footer.
pub const MIN_BLOCK_BYTES: u32 = 16;
