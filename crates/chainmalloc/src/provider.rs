//! Region providers: the boundary between the heap and its backing storage.
//!
//! The heap engine never talks to the OS directly; it asks a [`RegionProvider`]
//! for zero-initialized, page-aligned regions and hands them back only when the
//! heap itself is dropped. [`MmapRegions`] is the production provider backed by
//! anonymous mappings; [`FixedRegions`] carves regions out of one fixed buffer
//! so tests can run deterministically and simulate exhaustion.

use crate::platform;
use crate::util::{align_up, page_size};
use core::alloc::Layout;

/// One region granted by a provider.
///
/// `len` is the provider's actual grant, always a multiple of its page size
/// and at least the requested byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub base: *mut u8,
    pub len: usize,
}

/// Source of page-aligned, zero-initialized backing regions.
pub trait RegionProvider {
    /// Grant granularity; every [`Region::len`] is a multiple of this.
    fn page_size(&self) -> usize;

    /// Grant a zeroed region of at least `min_bytes`, rounded up to page
    /// granularity. `None` when the provider cannot satisfy the request.
    ///
    /// # Safety
    /// The returned region is exclusively owned by the caller until passed
    /// back to [`release`](Self::release).
    unsafe fn acquire(&mut self, min_bytes: usize) -> Option<Region>;

    /// Return a region obtained from [`acquire`](Self::acquire).
    ///
    /// # Safety
    /// `region` must have come from `acquire` on this provider and must not
    /// be accessed afterwards.
    unsafe fn release(&mut self, region: Region);
}

/// Regions backed by anonymous memory mappings ([`platform::map_anonymous`]).
pub struct MmapRegions;

impl RegionProvider for MmapRegions {
    fn page_size(&self) -> usize {
        page_size()
    }

    unsafe fn acquire(&mut self, min_bytes: usize) -> Option<Region> {
        let len = align_up(min_bytes, self.page_size());
        if len == 0 {
            return None;
        }
        let base = unsafe { platform::map_anonymous(len) };
        if base.is_null() {
            None
        } else {
            Some(Region { base, len })
        }
    }

    unsafe fn release(&mut self, region: Region) {
        unsafe { platform::unmap(region.base, region.len) };
    }
}

/// Page granularity emulated by [`FixedRegions`].
const FIXED_PAGE: usize = 4096;

#[repr(align(4096))]
struct PageBuf<const N: usize>([u8; N]);

/// A provider carving regions out of one fixed, page-aligned, zeroed buffer.
///
/// Grants are sequential and never recycled, so every grant is zeroed and
/// regions never overlap. Refuses once the buffer is exhausted, which makes
/// out-of-memory paths testable without touching the real OS. Counts
/// acquisitions and releases so teardown behavior is observable.
pub struct FixedRegions<const N: usize> {
    buf: Box<PageBuf<N>>,
    used: usize,
    acquired: usize,
    released: usize,
}

impl<const N: usize> FixedRegions<N> {
    pub fn new() -> Self {
        // Allocate the buffer in place; a large PageBuf built on the stack
        // first would overflow it.
        let layout = Layout::new::<PageBuf<N>>();
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        if raw.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        let buf = unsafe { Box::from_raw(raw as *mut PageBuf<N>) };
        FixedRegions {
            buf,
            used: 0,
            acquired: 0,
            released: 0,
        }
    }

    /// Bytes granted so far.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes still grantable.
    pub fn remaining(&self) -> usize {
        N - self.used
    }

    /// Number of successful `acquire` calls.
    pub fn acquired(&self) -> usize {
        self.acquired
    }

    /// Number of `release` calls.
    pub fn released(&self) -> usize {
        self.released
    }
}

impl<const N: usize> Default for FixedRegions<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RegionProvider for FixedRegions<N> {
    fn page_size(&self) -> usize {
        FIXED_PAGE
    }

    unsafe fn acquire(&mut self, min_bytes: usize) -> Option<Region> {
        let len = align_up(min_bytes, FIXED_PAGE);
        if len == 0 || len > N - self.used {
            return None;
        }
        let base = unsafe { self.buf.0.as_mut_ptr().add(self.used) };
        self.used += len;
        self.acquired += 1;
        Some(Region { base, len })
    }

    unsafe fn release(&mut self, _region: Region) {
        // Carved space is not recycled; only the count is observable.
        self.released += 1;
    }
}
