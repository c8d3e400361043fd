use core::ptr;

// Windows stubs so the crate compiles on Windows targets.

pub unsafe fn map_anonymous(_size: usize) -> *mut u8 {
    ptr::null_mut() // TODO: VirtualAlloc(MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE)
}

pub unsafe fn unmap(_ptr: *mut u8, _size: usize) {
    // TODO: VirtualFree(MEM_RELEASE)
}
