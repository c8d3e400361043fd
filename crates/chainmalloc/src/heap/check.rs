//! Structural verification of the arena registry and block chain.
//!
//! [`Heap::verify`] recomputes from scratch everything the incremental
//! counters claim, and checks every link and layout invariant on the way.
//! It is the oracle behind the integration tests and the fuzz target.

use super::{ARENA_HEADER_SIZE, ArenaHeader, BlockHeader, Heap};
use crate::provider::RegionProvider;
use crate::util::{ALIGN_UNIT, is_aligned};
use core::ptr;

/// Result of a full scan. `is_ok` means a structurally sound heap whose
/// counters agree with the scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChainReport {
    /// Arenas in the registry.
    pub arenas: usize,
    /// Sum of recorded arena sizes; must equal `total_bytes`.
    pub arena_bytes: usize,
    /// Blocks in the chain.
    pub blocks: usize,
    /// Free blocks in the chain.
    pub free_blocks: usize,
    /// Sum of free block payloads; must equal `free_bytes`.
    pub free_payload: usize,
    /// Broken prev/next pairings in either list.
    pub link_errors: usize,
    /// Blocks outside any arena, misaligned records, or gaps between
    /// same-arena chain neighbors.
    pub layout_errors: usize,
    /// Scan totals disagreeing with the heap's incremental counters.
    pub counter_mismatches: usize,
}

impl ChainReport {
    /// True when the scan found no structural or accounting faults.
    pub fn is_ok(&self) -> bool {
        self.link_errors == 0 && self.layout_errors == 0 && self.counter_mismatches == 0
    }
}

/// Point-in-time snapshot combining the counters with structure counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Cumulative bytes obtained from the provider.
    pub total_bytes: usize,
    /// Sum of free block payloads.
    pub free_bytes: usize,
    /// Arenas in the registry.
    pub arenas: usize,
    /// Blocks in the chain.
    pub blocks: usize,
    /// Free blocks in the chain.
    pub free_blocks: usize,
}

impl<P: RegionProvider> Heap<P> {
    /// Walk the registry and the chain end to end, recomputing every figure
    /// the counters track and checking structural invariants.
    pub fn verify(&self) -> ChainReport {
        let mut report = ChainReport::default();

        unsafe {
            let mut arena = self.arenas;
            let mut prev_arena: *mut ArenaHeader = ptr::null_mut();
            while !arena.is_null() {
                report.arenas += 1;
                report.arena_bytes += (*arena).size;
                if (*arena).prev != prev_arena {
                    report.link_errors += 1;
                }
                if (*arena).size < ARENA_HEADER_SIZE
                    || (*arena).first_block as *mut u8 != ArenaHeader::first_block_slot(arena)
                {
                    report.layout_errors += 1;
                }
                prev_arena = arena;
                arena = (*arena).next;
            }

            let mut blk = self.head;
            let mut prev_blk: *mut BlockHeader = ptr::null_mut();
            let mut prev_owner: *mut ArenaHeader = ptr::null_mut();
            while !blk.is_null() {
                report.blocks += 1;
                if (*blk).free {
                    report.free_blocks += 1;
                    report.free_payload += (*blk).size;
                }
                if (*blk).prev != prev_blk {
                    report.link_errors += 1;
                }
                if !is_aligned((*blk).size, ALIGN_UNIT)
                    || !is_aligned(BlockHeader::payload(blk) as usize, ALIGN_UNIT)
                {
                    report.layout_errors += 1;
                }

                let owner = self.owning_arena(blk as *const u8);
                if owner.is_null() || !ArenaHeader::contains(owner, BlockHeader::end(blk).sub(1)) {
                    report.layout_errors += 1;
                }
                // Within one arena the chain runs wall to wall: a gap
                // between same-arena neighbors means a lost record.
                if !prev_blk.is_null()
                    && owner == prev_owner
                    && !BlockHeader::contiguous(prev_blk, blk)
                {
                    report.layout_errors += 1;
                }

                prev_owner = owner;
                prev_blk = blk;
                blk = (*blk).next;
            }
            if self.tail != prev_blk {
                report.link_errors += 1;
            }
        }

        if report.arena_bytes != self.total_bytes || report.free_payload != self.free_bytes {
            report.counter_mismatches += 1;
        }
        report
    }

    /// Counter snapshot plus structure counts from a scan.
    pub fn stats(&self) -> HeapStats {
        let report = self.verify();
        HeapStats {
            total_bytes: self.total_bytes,
            free_bytes: self.free_bytes,
            arenas: report.arenas,
            blocks: report.blocks,
            free_blocks: report.free_blocks,
        }
    }

    /// Registry entry whose span contains `addr`, or null.
    fn owning_arena(&self, addr: *const u8) -> *mut ArenaHeader {
        let mut arena = self.arenas;
        while !arena.is_null() {
            unsafe {
                if ArenaHeader::contains(arena, addr) {
                    return arena;
                }
                arena = (*arena).next;
            }
        }
        ptr::null_mut()
    }
}
