use core::sync::atomic::{AtomicUsize, Ordering};

/// Alignment unit for payloads and header placement.
/// Every payload address and every payload size is a multiple of this.
pub const ALIGN_UNIT: usize = 8;

/// Default minimum bytes requested from the provider per new arena.
pub const DEFAULT_GROWTH_UNIT: usize = 1024 * 1024;

/// Align `value` up to the next multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Align `value` down to the previous multiple of `align`.
/// `align` must be a power of two.
#[inline(always)]
pub const fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Check if `value` is aligned to `align`.
#[inline(always)]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Runtime page size, read from sysconf(_SC_PAGESIZE) on first use.
/// 0 means "not read yet".
static PAGE_SIZE_CACHED: AtomicUsize = AtomicUsize::new(0);

/// Get the system page size. Cached after the first call.
#[inline(always)]
pub fn page_size() -> usize {
    let cached = PAGE_SIZE_CACHED.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    read_page_size()
}

#[cold]
fn read_page_size() -> usize {
    #[cfg(unix)]
    let ps = {
        let ps = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if ps > 0 { ps as usize } else { 4096 }
    };
    #[cfg(not(unix))]
    let ps = 4096;
    PAGE_SIZE_CACHED.store(ps, Ordering::Relaxed);
    ps
}
