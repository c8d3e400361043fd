//! The heap engine: arena registry, global block chain, first-fit placement.
//!
//! A [`Heap`] owns every region it obtains from its provider. Each region
//! hosts one arena header followed by block records; all blocks across all
//! arenas form a single doubly linked chain in creation order. Placement is
//! first-fit over that chain, with splitting on oversized hits and
//! coalescing of address-contiguous neighbors on release.

pub mod arena;
pub mod block;
pub mod check;

pub use arena::{ARENA_HEADER_SIZE, ArenaHeader};
pub use block::{BlockHeader, HEADER_SIZE};
pub use check::{ChainReport, HeapStats};

use crate::config::HeapConfig;
use crate::provider::{MmapRegions, Region, RegionProvider};
use crate::util::{ALIGN_UNIT, align_up, is_aligned};
use core::ptr;
use log::{debug, trace};

/// A heap: one arena registry, one block chain, two counters, and the
/// provider the arenas came from. Independent heaps share nothing.
///
/// Operations take `&mut self`: a heap has a single logical owner, and the
/// borrow checker enforces that calls never overlap. For shared use, wrap it
/// in [`LockedHeap`](crate::LockedHeap), which serializes every call behind
/// one mutex.
pub struct Heap<P: RegionProvider = MmapRegions> {
    provider: P,
    growth_unit: usize,
    /// Registry head, most-recently-acquired arena first.
    arenas: *mut ArenaHeader,
    /// Chain endpoints, creation order.
    head: *mut BlockHeader,
    tail: *mut BlockHeader,
    /// Cumulative provider grants. Never decreases.
    total_bytes: usize,
    /// Sum of free block payloads, kept exact by every operation.
    /// [`Heap::verify`] recomputes it from the chain; the two always agree.
    free_bytes: usize,
}

unsafe impl<P: RegionProvider + Send> Send for Heap<P> {}

impl Heap<MmapRegions> {
    /// Heap over anonymous mappings with the default configuration.
    pub const fn new() -> Self {
        Self::with_provider(MmapRegions, HeapConfig::DEFAULT)
    }
}

impl Default for Heap<MmapRegions> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RegionProvider> Heap<P> {
    /// Heap over a caller-supplied provider.
    pub const fn with_provider(provider: P, config: HeapConfig) -> Self {
        let growth_unit = if config.growth_unit < ALIGN_UNIT {
            ALIGN_UNIT
        } else {
            config.growth_unit
        };
        Heap {
            provider,
            growth_unit,
            arenas: ptr::null_mut(),
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            total_bytes: 0,
            free_bytes: 0,
        }
    }

    /// Cumulative bytes obtained from the provider, header overhead included.
    #[inline]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Exact sum of free block payload sizes.
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Minimum bytes requested from the provider per new arena.
    pub fn growth_unit(&self) -> usize {
        self.growth_unit
    }

    /// Change the growth unit for future arena acquisitions.
    pub fn set_growth_unit(&mut self, bytes: usize) {
        self.growth_unit = bytes.max(ALIGN_UNIT);
    }

    /// Borrow the provider, e.g. to inspect a test provider's counters.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Allocate `size` bytes. The returned address is aligned to
    /// [`ALIGN_UNIT`] and valid until freed, resized away, or the heap is
    /// dropped.
    ///
    /// Returns null when `size` is zero or the provider cannot supply a new
    /// arena; existing state is untouched in both cases.
    ///
    /// # Safety
    /// The caller must not use the payload beyond `size` bytes, after
    /// freeing it, or after the heap is dropped.
    pub unsafe fn malloc(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        // Requests this large cannot be satisfied and would overflow the
        // size arithmetic below.
        if size > usize::MAX / 2 {
            return ptr::null_mut();
        }
        let want = align_up(size, ALIGN_UNIT);

        let blk = self.find_first_fit(want);
        let blk = if blk.is_null() {
            let blk = unsafe { self.acquire_arena(want) };
            if blk.is_null() {
                return ptr::null_mut();
            }
            blk
        } else {
            unsafe {
                let old_size = (*blk).size;
                if old_size >= want + HEADER_SIZE + ALIGN_UNIT {
                    self.split(blk, want);
                }
                (*blk).free = false;
                self.free_bytes -= old_size;
            }
            blk
        };

        unsafe { BlockHeader::payload(blk) }
    }

    /// Release a payload obtained from this heap.
    ///
    /// Null is a no-op. Releasing an already-free payload is a silent no-op
    /// as well, so a double free is defined behavior.
    ///
    /// # Safety
    /// `ptr` must be null or a payload address previously returned by this
    /// heap and not relocated away by a later `realloc`.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let blk = BlockHeader::from_payload(ptr);
            if (*blk).free {
                return;
            }
            (*blk).free = true;
            self.free_bytes += (*blk).size;
            self.coalesce(blk);
        }
    }

    /// Resize a payload, preserving its leading `min(old, new)` bytes.
    ///
    /// Null behaves as `malloc(new_size)`. `new_size == 0` behaves as
    /// `free(ptr)` and returns null. The shrink and forward-merge paths keep
    /// the address unchanged; only the relocating path moves the payload,
    /// and a failed relocation returns null with the old payload untouched
    /// and still valid.
    ///
    /// # Safety
    /// Same contract as [`free`](Self::free) for `ptr`; when a different
    /// address is returned the old one must no longer be used.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return unsafe { self.malloc(new_size) };
        }
        if new_size == 0 {
            unsafe { self.free(ptr) };
            return ptr::null_mut();
        }
        if new_size > usize::MAX / 2 {
            return ptr::null_mut();
        }

        let want = align_up(new_size, ALIGN_UNIT);
        let blk = unsafe { BlockHeader::from_payload(ptr) };
        let old_size = unsafe { (*blk).size };

        // Shrink or already big enough: stay in place.
        if old_size >= want {
            if old_size >= want + HEADER_SIZE + ALIGN_UNIT {
                unsafe { self.split(blk, want) };
            }
            return ptr;
        }

        // Grow into a free, address-contiguous successor: address stays.
        unsafe {
            let next = (*blk).next;
            if !next.is_null()
                && (*next).free
                && BlockHeader::contiguous(blk, next)
                && old_size + HEADER_SIZE + (*next).size >= want
            {
                trace!(
                    "grow in place: {} + {} absorbs successor of {}",
                    old_size,
                    HEADER_SIZE,
                    (*next).size
                );
                self.free_bytes -= (*next).size;
                self.absorb_next(blk);
                if (*blk).size >= want + HEADER_SIZE + ALIGN_UNIT {
                    self.split(blk, want);
                }
                return ptr;
            }
        }

        // Relocate: fresh block, copy the surviving prefix, release the old.
        unsafe {
            let new_ptr = self.malloc(new_size);
            if new_ptr.is_null() {
                return ptr::null_mut();
            }
            ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(new_size));
            self.free(ptr);
            new_ptr
        }
    }

    /// First free block in chain order with payload >= `want`, or null.
    fn find_first_fit(&self, want: usize) -> *mut BlockHeader {
        let mut cur = self.head;
        while !cur.is_null() {
            unsafe {
                if (*cur).free && (*cur).size >= want {
                    return cur;
                }
                cur = (*cur).next;
            }
        }
        ptr::null_mut()
    }

    /// Install a new arena sized for a `want`-byte first block.
    ///
    /// The provider request is the larger of the block's need and the growth
    /// unit; the arena records the provider's page-rounded grant. The first
    /// block is laid out used immediately after the arena header and
    /// appended to the chain tail; remaining space becomes one trailing free
    /// block when it can hold a header plus one alignment unit of payload.
    unsafe fn acquire_arena(&mut self, want: usize) -> *mut BlockHeader {
        let need = HEADER_SIZE + want;
        let min_bytes = ARENA_HEADER_SIZE + need.max(self.growth_unit);

        let Some(region) = (unsafe { self.provider.acquire(min_bytes) }) else {
            debug!("region acquisition failed: {} bytes", min_bytes);
            return ptr::null_mut();
        };
        debug_assert!(region.len >= min_bytes);
        debug_assert!(is_aligned(region.base as usize, ALIGN_UNIT));

        unsafe {
            let arena = region.base as *mut ArenaHeader;
            ptr::write(
                arena,
                ArenaHeader {
                    size: region.len,
                    prev: ptr::null_mut(),
                    next: self.arenas,
                    first_block: ptr::null_mut(),
                },
            );
            if !self.arenas.is_null() {
                (*self.arenas).prev = arena;
            }
            self.arenas = arena;
            self.total_bytes += region.len;

            let blk = ArenaHeader::first_block_slot(arena) as *mut BlockHeader;
            ptr::write(
                blk,
                BlockHeader {
                    size: want,
                    free: false,
                    prev: self.tail,
                    next: ptr::null_mut(),
                },
            );
            if self.head.is_null() {
                self.head = blk;
            }
            if !self.tail.is_null() {
                (*self.tail).next = blk;
            }
            self.tail = blk;
            (*arena).first_block = blk;

            let used = ARENA_HEADER_SIZE + HEADER_SIZE + want;
            if region.len >= used + HEADER_SIZE + ALIGN_UNIT {
                let rest = BlockHeader::end(blk) as *mut BlockHeader;
                ptr::write(
                    rest,
                    BlockHeader {
                        size: region.len - used - HEADER_SIZE,
                        free: true,
                        prev: blk,
                        next: ptr::null_mut(),
                    },
                );
                (*blk).next = rest;
                self.tail = rest;
                self.free_bytes += (*rest).size;
            }

            debug!(
                "arena acquired: {} bytes ({} total across {} request)",
                region.len, self.total_bytes, min_bytes
            );
            blk
        }
    }

    /// Carve the tail of `blk` into a new free block, leaving `blk` with
    /// exactly `want` payload bytes. Caller checked
    /// `blk.size >= want + HEADER_SIZE + ALIGN_UNIT`.
    unsafe fn split(&mut self, blk: *mut BlockHeader, want: usize) {
        unsafe {
            let remain = (*blk).size - want;
            (*blk).size = want;

            let rest = BlockHeader::end(blk) as *mut BlockHeader;
            ptr::write(
                rest,
                BlockHeader {
                    size: remain - HEADER_SIZE,
                    free: true,
                    prev: blk,
                    next: (*blk).next,
                },
            );
            if !(*rest).next.is_null() {
                (*(*rest).next).prev = rest;
            } else {
                self.tail = rest;
            }
            (*blk).next = rest;

            self.free_bytes += (*rest).size;
            trace!("split: {} kept, {} freed", want, remain - HEADER_SIZE);
        }
    }

    /// Merge `blk` with free, address-contiguous chain neighbors; merging
    /// into the predecessor makes the predecessor the surviving record.
    /// Each completed merge turns one absorbed header into payload, credited
    /// to the free-byte tally.
    unsafe fn coalesce(&mut self, blk: *mut BlockHeader) -> *mut BlockHeader {
        unsafe {
            let mut blk = blk;
            let next = (*blk).next;
            if !next.is_null() && (*next).free && BlockHeader::contiguous(blk, next) {
                self.absorb_next(blk);
                self.free_bytes += HEADER_SIZE;
                trace!("coalesced with successor: {} payload", (*blk).size);
            }
            let prev = (*blk).prev;
            if !prev.is_null() && (*prev).free && BlockHeader::contiguous(prev, blk) {
                self.absorb_next(prev);
                self.free_bytes += HEADER_SIZE;
                blk = prev;
                trace!("coalesced with predecessor: {} payload", (*blk).size);
            }
            blk
        }
    }

    /// Absorb `blk`'s chain successor: sizes merge and the successor record
    /// leaves the chain. Caller checked that the successor exists, is free,
    /// and is address-contiguous; the tally is the caller's business.
    unsafe fn absorb_next(&mut self, blk: *mut BlockHeader) {
        unsafe {
            let next = (*blk).next;
            (*blk).size += HEADER_SIZE + (*next).size;
            (*blk).next = (*next).next;
            if !(*blk).next.is_null() {
                (*(*blk).next).prev = blk;
            } else {
                self.tail = blk;
            }
        }
    }
}

impl<P: RegionProvider> Drop for Heap<P> {
    fn drop(&mut self) {
        // Arena headers live inside the regions being released; read the
        // link before giving the region back.
        let mut arena = self.arenas;
        while !arena.is_null() {
            unsafe {
                let next = (*arena).next;
                let region = Region {
                    base: arena as *mut u8,
                    len: (*arena).size,
                };
                self.provider.release(region);
                arena = next;
            }
        }
        self.arenas = ptr::null_mut();
        self.head = ptr::null_mut();
        self.tail = ptr::null_mut();
    }
}
