//! A first-fit heap over provider-granted regions.
//!
//! A [`Heap`] grows by acquiring page-aligned arenas from a
//! [`RegionProvider`] and never gives one back until dropped. Every block in
//! every arena sits on one doubly linked chain in creation order; placement
//! is first-fit over that chain, splitting oversized hits and coalescing
//! address-contiguous neighbors on release. [`LockedHeap`] wraps a heap in
//! an allocation-free mutex and implements `GlobalAlloc`.

extern crate libc;

pub mod config;
pub mod global_alloc;
pub mod heap;
pub mod platform;
pub mod provider;
pub mod sync;
pub mod util;

pub use config::HeapConfig;
pub use global_alloc::LockedHeap;
pub use heap::{ARENA_HEADER_SIZE, ChainReport, HEADER_SIZE, Heap, HeapStats};
pub use provider::{FixedRegions, MmapRegions, Region, RegionProvider};
pub use util::ALIGN_UNIT;
