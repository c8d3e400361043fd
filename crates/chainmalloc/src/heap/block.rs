use crate::util::{ALIGN_UNIT, align_up};

/// Per-block record, embedded in its arena immediately before the payload.
///
/// Blocks belong to one global doubly linked chain ordered by creation time.
/// Chain order matches address order inside a single arena by construction,
/// but not across arenas.
#[repr(C)]
pub struct BlockHeader {
    /// Payload bytes following the header. Always a multiple of [`ALIGN_UNIT`].
    pub size: usize,
    /// Whether the payload is currently available for placement.
    pub free: bool,
    /// Chain predecessor.
    pub prev: *mut BlockHeader,
    /// Chain successor.
    pub next: *mut BlockHeader,
}

/// Header footprint, padded to the alignment unit so payloads stay aligned.
pub const HEADER_SIZE: usize = align_up(core::mem::size_of::<BlockHeader>(), ALIGN_UNIT);

impl BlockHeader {
    /// Payload address of `blk`.
    ///
    /// # Safety
    /// `blk` must point to a live block header.
    #[inline(always)]
    pub unsafe fn payload(blk: *mut BlockHeader) -> *mut u8 {
        unsafe { (blk as *mut u8).add(HEADER_SIZE) }
    }

    /// Recover the owning block from a payload address.
    ///
    /// # Safety
    /// `ptr` must be a payload address previously produced by [`payload`]
    /// (the inverse offset is applied blindly).
    ///
    /// [`payload`]: Self::payload
    #[inline(always)]
    pub unsafe fn from_payload(ptr: *mut u8) -> *mut BlockHeader {
        unsafe { ptr.sub(HEADER_SIZE) as *mut BlockHeader }
    }

    /// First address past `blk`'s payload.
    ///
    /// # Safety
    /// `blk` must point to a live block header.
    #[inline(always)]
    pub unsafe fn end(blk: *mut BlockHeader) -> *mut u8 {
        unsafe { Self::payload(blk).add((*blk).size) }
    }

    /// Whether `next` starts exactly where `blk`'s payload ends, i.e. the two
    /// records occupy one contiguous byte range and merging them is sound.
    ///
    /// # Safety
    /// Both pointers must point to live block headers.
    #[inline(always)]
    pub unsafe fn contiguous(blk: *mut BlockHeader, next: *mut BlockHeader) -> bool {
        unsafe { Self::end(blk) == next as *mut u8 }
    }
}
