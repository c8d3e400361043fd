//! `#[global_allocator]` support.
//!
//! [`LockedHeap`] pairs a [`Heap`] over anonymous mappings with an
//! allocation-free mutex, so one heap can back a whole program:
//!
//! ```rust,ignore
//! use chainmalloc::LockedHeap;
//!
//! #[global_allocator]
//! static GLOBAL: LockedHeap = LockedHeap::new();
//! ```

use crate::config::HeapConfig;
use crate::heap::{ChainReport, Heap, HeapStats};
use crate::provider::MmapRegions;
use crate::sync::{Mutex, MutexGuard};
use crate::util::{ALIGN_UNIT, align_up};
use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

/// A mutex-serialized [`Heap`] suitable for a `static`.
///
/// Construction is const and does nothing; the first call reads environment
/// overrides and later ones find the flag set. Every operation takes the
/// lock for its full duration.
pub struct LockedHeap {
    inner: Mutex<Heap<MmapRegions>>,
    /// Guarded by the mutex; atomic only for interior mutability.
    configured: AtomicBool,
}

impl LockedHeap {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Heap::new()),
            configured: AtomicBool::new(false),
        }
    }

    fn lock_configured(&self) -> MutexGuard<'_, Heap<MmapRegions>> {
        let mut guard = self.inner.lock();
        if !self.configured.load(Ordering::Relaxed) {
            let config = unsafe { HeapConfig::from_env() };
            guard.set_growth_unit(config.growth_unit);
            self.configured.store(true, Ordering::Relaxed);
        }
        guard
    }

    /// Locked [`Heap::malloc`].
    ///
    /// # Safety
    /// Same contract as [`Heap::malloc`].
    pub unsafe fn malloc(&self, size: usize) -> *mut u8 {
        unsafe { self.lock_configured().malloc(size) }
    }

    /// Locked [`Heap::free`].
    ///
    /// # Safety
    /// Same contract as [`Heap::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        unsafe { self.lock_configured().free(ptr) }
    }

    /// Locked [`Heap::realloc`].
    ///
    /// # Safety
    /// Same contract as [`Heap::realloc`].
    pub unsafe fn realloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        unsafe { self.lock_configured().realloc(ptr, new_size) }
    }

    /// Locked [`Heap::total_bytes`].
    pub fn total_bytes(&self) -> usize {
        self.lock_configured().total_bytes()
    }

    /// Locked [`Heap::free_bytes`].
    pub fn free_bytes(&self) -> usize {
        self.lock_configured().free_bytes()
    }

    /// Locked [`Heap::stats`].
    pub fn stats(&self) -> HeapStats {
        self.lock_configured().stats()
    }

    /// Locked [`Heap::verify`].
    pub fn verify(&self) -> ChainReport {
        self.lock_configured().verify()
    }

    /// Serve an alignment the heap itself does not guarantee: over-allocate,
    /// round the payload up, and stash the engine address in the word below
    /// the returned pointer for [`dealloc`](GlobalAlloc::dealloc) to find.
    unsafe fn alloc_over_aligned(&self, size: usize, align: usize) -> *mut u8 {
        const WORD: usize = core::mem::size_of::<usize>();
        let total = match size.checked_add(align).and_then(|t| t.checked_add(WORD)) {
            Some(t) => t,
            None => return ptr::null_mut(),
        };
        unsafe {
            let raw = self.malloc(total);
            if raw.is_null() {
                return ptr::null_mut();
            }
            let payload = align_up(raw as usize + WORD, align) as *mut u8;
            (payload as *mut usize).sub(1).write(raw as usize);
            payload
        }
    }
}

impl Default for LockedHeap {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for LockedHeap {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        let align = layout.align();

        // Zero-size types: a well-aligned dangling pointer, the pattern the
        // standard library itself uses.
        if size == 0 {
            return align as *mut u8;
        }

        if align <= ALIGN_UNIT {
            unsafe { self.malloc(size) }
        } else {
            unsafe { self.alloc_over_aligned(size, align) }
        }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // Recycled blocks still hold their previous contents, so zero
        // unconditionally.
        let ptr = unsafe { self.alloc(layout) };
        if !ptr.is_null() && layout.size() != 0 {
            unsafe { core::ptr::write_bytes(ptr, 0, layout.size()) };
        }
        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        if layout.align() <= ALIGN_UNIT {
            unsafe { self.free(ptr) }
        } else {
            // Recover the engine address stashed below the aligned payload.
            let raw = unsafe { (ptr as *mut usize).sub(1).read() } as *mut u8;
            unsafe { self.free(raw) }
        }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let old_size = layout.size();
        let align = layout.align();

        // Old allocation was zero-sized: effectively a fresh alloc.
        if old_size == 0 {
            return unsafe { self.alloc(Layout::from_size_align_unchecked(new_size, align)) };
        }

        debug_assert!(new_size > 0, "GlobalAlloc::realloc called with new_size == 0");

        if align <= ALIGN_UNIT {
            unsafe { LockedHeap::realloc(self, ptr, new_size) }
        } else {
            // The engine's in-place resize paths only keep ALIGN_UNIT
            // alignment; move to a fresh over-aligned block instead.
            unsafe {
                let new_ptr = self.alloc_over_aligned(new_size, align);
                if !new_ptr.is_null() {
                    core::ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(new_size));
                    self.dealloc(ptr, layout);
                }
                new_ptr
            }
        }
    }
}
