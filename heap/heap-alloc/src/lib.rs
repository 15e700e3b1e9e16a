//! # Segregated-Fit Heap Allocator
//!
//! A general-purpose dynamic memory allocator over a single contiguous,
//! monotonically growable heap region. Clients request variably sized
//! payloads, release them, and resize them; freed space is reused through
//! segregated free lists and boundary-tag coalescing.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Allocator Frontend (heap)                │
//! │    • alloc / alloc_zeroed / free / realloc          │
//! │    • split-on-allocate, coalesce-on-free            │
//! │    • growth fallback, consistency checker           │
//! └─────────┬──────────────────────────┬────────────────┘
//!           │                          │
//! ┌─────────▼────────────┐  ┌──────────▼────────────────┐
//! │ Segregated free      │  │ Boundary-tagged blocks    │
//! │ lists (seg_list)     │  │ (block)                   │
//! │  • 8 size classes    │  │  • 4-byte tag words       │
//! │  • LIFO push,        │  │  • header/footer pairs    │
//! │    guarded cursor    │  │  • neighbour traversal    │
//! └─────────┬────────────┘  └──────────┬────────────────┘
//!           │                          │
//! ┌─────────▼──────────────────────────▼────────────────┐
//! │            Heap Segment (segment)                   │
//! │    • sbrk-style growth, byte-slice access           │
//! │    • SliceHeap over caller-owned storage            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Properties
//!
//! - **Offsets, not pointers**: every position is a [`HeapOffset`] measured
//!   from the region start, so the heap is relocatable and the free-list
//!   links stored inside payloads are pointer-width independent.
//! - **Interpreted bytes**: boundary tags and links are read and written
//!   through checked little-endian accessors on the region's byte slice; no
//!   structured type is ever overlaid on heap memory, and the whole crate is
//!   free of `unsafe`.
//! - **First fit over size classes**: allocation probes the class for the
//!   rounded request and every larger class, splits when the leftover can
//!   stand alone, and grows the segment as a last resort.
//! - **Complete coalescing**: freeing merges with both neighbours, so no two
//!   adjacent free blocks ever survive a `free`.
//! - **Single-threaded**: every operation takes `&mut self`; wrap the
//!   allocator in a lock if it must be shared.
//!
//! ## Usage
//!
//! ```rust
//! use heap_alloc::{SegListAllocator, SliceHeap};
//!
//! let mut storage = [0_u8; 4096];
//! let mut heap = SegListAllocator::new(SliceHeap::new(&mut storage)).expect("empty segment");
//!
//! if let Some(p) = heap.alloc(100) {
//!     heap.payload_mut(p)[..4].copy_from_slice(b"data");
//!     let p = heap.realloc(Some(p), 200).expect("grow");
//!     assert_eq!(&heap.payload(p)[..4], b"data");
//!     heap.free(p);
//! }
//! ```
//!
//! ## Error Model
//!
//! Out of memory is not an error condition: `alloc` and `realloc` return
//! `None` when the segment refuses to grow, and the heap stays fully usable.
//! Construction returns [`InitError`]; the structural checker reports
//! [`CheckError`]. Passing offsets that were never allocated (or freeing
//! twice) is not detected and leaves the heap in an unspecified state; the
//! bounds-guarded list traversal only keeps stale links from escaping the
//! region.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod block;
mod seg_list;

pub mod heap;
pub mod segment;

pub use heap::{CheckError, InitError, SegListAllocator};
pub use heap_layout::{BlockSize, HeapOffset};
pub use segment::{HeapExhausted, HeapSegment, SliceHeap};
