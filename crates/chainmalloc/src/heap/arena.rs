use crate::heap::block::BlockHeader;
use crate::util::{ALIGN_UNIT, align_up};

/// Per-arena record written at the start of each region.
///
/// Arenas form a doubly linked registry, most-recently-acquired first. An
/// arena is installed when no existing block satisfies a request and is only
/// ever returned to the provider when the owning heap is dropped.
#[repr(C)]
pub struct ArenaHeader {
    /// Total bytes in the region, headers included. This is the provider's
    /// page-rounded grant, so summing arena sizes reproduces exactly what
    /// was obtained from the provider.
    pub size: usize,
    /// Registry predecessor.
    pub prev: *mut ArenaHeader,
    /// Registry successor.
    pub next: *mut ArenaHeader,
    /// First block hosted by this arena.
    pub first_block: *mut BlockHeader,
}

/// Arena header footprint, padded to the alignment unit so the first block
/// header lands aligned.
pub const ARENA_HEADER_SIZE: usize = align_up(core::mem::size_of::<ArenaHeader>(), ALIGN_UNIT);

impl ArenaHeader {
    /// Address of the first block slot, immediately after the arena header.
    ///
    /// # Safety
    /// `arena` must point to a live arena header.
    #[inline(always)]
    pub unsafe fn first_block_slot(arena: *mut ArenaHeader) -> *mut u8 {
        unsafe { (arena as *mut u8).add(ARENA_HEADER_SIZE) }
    }

    /// First address past the arena's region.
    ///
    /// # Safety
    /// `arena` must point to a live arena header.
    #[inline(always)]
    pub unsafe fn end(arena: *mut ArenaHeader) -> *mut u8 {
        unsafe { (arena as *mut u8).add((*arena).size) }
    }

    /// Whether `addr` falls inside this arena's region.
    ///
    /// # Safety
    /// `arena` must point to a live arena header.
    #[inline(always)]
    pub unsafe fn contains(arena: *mut ArenaHeader, addr: *const u8) -> bool {
        let base = arena as usize;
        let a = addr as usize;
        base <= a && a < base + unsafe { (*arena).size }
    }
}
