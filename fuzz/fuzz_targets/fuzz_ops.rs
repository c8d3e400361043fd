#![no_main]

use chainmalloc::{FixedRegions, Heap, HeapConfig};
use libfuzzer_sys::fuzz_target;

/// Fuzz target that interprets a byte slice as a sequence of heap operations
/// against a fresh, self-contained heap.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=malloc, 1=free, 2=realloc, 3=verify)
///   byte 1-2: size (little-endian u16)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// We track up to 64 live pointers, each stamped with a slot pattern, and a
/// full structural scan can be requested at any point of the stream.
const MAX_SLOTS: usize = 64;

/// Pool small enough to re-zero cheaply per run, but prone to exhaustion so
/// the failure paths get explored too.
const POOL: usize = 2 * 1024 * 1024;

const CHECK_PREFIX: usize = 256;

fuzz_target!(|data: &[u8]| {
    let mut heap: Heap<FixedRegions<POOL>> =
        Heap::with_provider(FixedRegions::new(), HeapConfig { growth_unit: 4096 });

    let mut slots: [*mut u8; MAX_SLOTS] = [std::ptr::null_mut(); MAX_SLOTS];
    let mut sizes: [usize; MAX_SLOTS] = [0; MAX_SLOTS];
    let mut stamps: [u8; MAX_SLOTS] = [0; MAX_SLOTS];

    let check = |p: *mut u8, len: usize, stamp: u8| {
        let n = std::cmp::min(len, CHECK_PREFIX);
        for j in 0..n {
            assert_eq!(
                unsafe { *p.add(j) },
                stamp,
                "payload byte {} changed while the block was live",
                j
            );
        }
    };

    let mut op_no = 0u32;
    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] & 0x03;
        let size = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
        let slot = (data[i + 3] as usize) % MAX_SLOTS;
        i += 4;
        op_no += 1;

        match opcode {
            0 => {
                // malloc, dropping whatever the slot held
                if !slots[slot].is_null() {
                    check(slots[slot], sizes[slot], stamps[slot]);
                    unsafe { heap.free(slots[slot]) };
                    slots[slot] = std::ptr::null_mut();
                }
                let ptr = unsafe { heap.malloc(size) };
                if size == 0 {
                    assert!(ptr.is_null(), "malloc(0) must fail");
                    continue;
                }
                if !ptr.is_null() {
                    assert_eq!(ptr as usize % 8, 0, "misaligned payload from malloc");
                    let stamp = (slot as u8) ^ 0xA5;
                    unsafe {
                        std::ptr::write_bytes(ptr, stamp, std::cmp::min(size, CHECK_PREFIX));
                    }
                    slots[slot] = ptr;
                    sizes[slot] = size;
                    stamps[slot] = stamp;
                }
            }
            1 => {
                // free
                if !slots[slot].is_null() {
                    check(slots[slot], sizes[slot], stamps[slot]);
                    unsafe { heap.free(slots[slot]) };
                    slots[slot] = std::ptr::null_mut();
                    sizes[slot] = 0;
                }
            }
            2 => {
                // realloc, including the null and zero-size edges
                if !slots[slot].is_null() {
                    check(slots[slot], sizes[slot], stamps[slot]);
                    let ptr = unsafe { heap.realloc(slots[slot], size) };
                    if !ptr.is_null() {
                        assert_eq!(ptr as usize % 8, 0, "misaligned payload from realloc");
                        // The surviving prefix keeps its bytes.
                        check(ptr, std::cmp::min(sizes[slot], size), stamps[slot]);
                        let stamp = stamps[slot].wrapping_add(0x33);
                        unsafe {
                            std::ptr::write_bytes(ptr, stamp, std::cmp::min(size, CHECK_PREFIX));
                        }
                        slots[slot] = ptr;
                        sizes[slot] = size;
                        stamps[slot] = stamp;
                    } else if size == 0 {
                        slots[slot] = std::ptr::null_mut();
                        sizes[slot] = 0;
                    }
                    // A null return for a non-zero size leaves the old block
                    // valid; the slot keeps it.
                } else {
                    let ptr = unsafe { heap.realloc(std::ptr::null_mut(), size) };
                    if !ptr.is_null() {
                        let stamp = (slot as u8) ^ 0x5A;
                        unsafe {
                            std::ptr::write_bytes(ptr, stamp, std::cmp::min(size, CHECK_PREFIX));
                        }
                        slots[slot] = ptr;
                        sizes[slot] = size;
                        stamps[slot] = stamp;
                    }
                }
            }
            3 => {
                // full structural scan
                let report = heap.verify();
                assert!(report.is_ok(), "scan failed at op {}: {:?}", op_no, report);
            }
            _ => unreachable!(),
        }
    }

    // Cleanup: everything freed, every arena back to one block.
    for slot in 0..MAX_SLOTS {
        if !slots[slot].is_null() {
            check(slots[slot], sizes[slot], stamps[slot]);
            unsafe { heap.free(slots[slot]) };
            slots[slot] = std::ptr::null_mut();
        }
    }
    let report = heap.verify();
    assert!(report.is_ok(), "final scan failed: {:?}", report);
    assert_eq!(report.free_blocks, report.blocks);
    assert_eq!(report.blocks, report.arenas, "full release must coalesce each arena");
});
