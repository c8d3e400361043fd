use crate::util::DEFAULT_GROWTH_UNIT;

/// Tunables applied when a [`Heap`](crate::Heap) is constructed.
///
/// Plain data; the heap clamps values it cannot work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Minimum bytes requested from the provider per new arena. Requests
    /// larger than this are passed through; the provider rounds either way
    /// to page granularity.
    pub growth_unit: usize,
}

impl HeapConfig {
    pub const DEFAULT: HeapConfig = HeapConfig {
        growth_unit: DEFAULT_GROWTH_UNIT,
    };

    /// The defaults, with `CHAINMALLOC_GROWTH_UNIT` applied when set to a
    /// decimal byte count. Unset or unparsable values are ignored.
    ///
    /// # Safety
    /// Calls `libc::getenv`, which must not race with environment mutation
    /// on another thread.
    pub unsafe fn from_env() -> HeapConfig {
        let mut config = Self::DEFAULT;
        if let Some(val) = unsafe { getenv_usize(b"CHAINMALLOC_GROWTH_UNIT\0") } {
            config.growth_unit = val;
        }
        config
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parse an environment variable as a usize.
///
/// Parsed without allocating: when the heap serves as the global allocator
/// this runs inside the first allocation call.
///
/// # Safety
/// Calls `libc::getenv`.
unsafe fn getenv_usize(key: &[u8]) -> Option<usize> {
    let val = unsafe { libc::getenv(key.as_ptr() as *const libc::c_char) };
    if val.is_null() {
        return None;
    }

    let mut result: usize = 0;
    let mut ptr = val as *const u8;
    loop {
        let byte = unsafe { *ptr };
        if byte == 0 {
            break;
        }
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((byte - b'0') as usize)?;
        ptr = unsafe { ptr.add(1) };
    }
    Some(result)
}
