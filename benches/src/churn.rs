//! Mixed-workload churn driver: bulk allocation, a realloc wave, partial
//! release, random churn, then full cleanup, with pattern checks and heap
//! figures printed after each phase.
//!
//! Build with `--release`; first-fit scan costs dominate debug builds.

use chainmalloc::{ALIGN_UNIT, LockedHeap};
use std::time::Instant;

static HEAP: LockedHeap = LockedHeap::new();

const N_ALLOC: usize = 50_000;
const MAX_SZ: usize = 1024;
/// Percent of live blocks resized in the realloc wave.
const REALLOC_RATE: usize = 30;
/// Percent chance to free each block in the partial release phase.
const FREE_RATE: usize = 50;
/// Mixed alloc/free/realloc operations in the churn phase.
const CHURN_ITERS: usize = 20_000;

/// Deterministic xorshift generator so runs are comparable.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

struct Slot {
    p: *mut u8,
    sz: usize,
    stamp: u32,
    live: bool,
}

/// Stamp byte everywhere, with fixed markers at the first and last byte.
unsafe fn fill_pattern(p: *mut u8, sz: usize, stamp: u32) {
    unsafe {
        std::ptr::write_bytes(p, (stamp & 0xFF) as u8, sz);
        if sz >= 1 {
            p.write(0xAB);
        }
        if sz >= 2 {
            p.add(sz - 1).write(0xCD);
        }
    }
}

unsafe fn check_pattern(p: *mut u8, sz: usize, stamp: u32) -> bool {
    if p.is_null() {
        return false;
    }
    unsafe {
        if sz >= 1 && p.read() != 0xAB {
            return false;
        }
        if sz >= 2 && p.add(sz - 1).read() != 0xCD {
            return false;
        }
        if sz < 3 {
            return true;
        }
        let b = (stamp & 0xFF) as u8;
        let body = std::slice::from_raw_parts(p, sz);
        body[1..sz - 1].iter().all(|&x| x == b)
    }
}

fn print_stats(tag: &str) {
    println!(
        "[{}] heap={}B free={}B",
        tag,
        HEAP.total_bytes(),
        HEAP.free_bytes()
    );
}

fn elapsed_ms(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1000.0
}

fn main() {
    let mut rng = Rng::new(42);
    let mut slots: Vec<Slot> = (0..N_ALLOC)
        .map(|_| Slot {
            p: std::ptr::null_mut(),
            sz: 0,
            stamp: 0,
            live: false,
        })
        .collect();

    // Phase 1: bulk allocation.
    let t = Instant::now();
    let mut live_bytes = 0usize;
    for (i, slot) in slots.iter_mut().enumerate() {
        let sz = rng.below(MAX_SZ) + 1;
        unsafe {
            let p = HEAP.malloc(sz);
            assert!(!p.is_null(), "malloc({}) failed in bulk phase", sz);
            assert_eq!(p as usize % ALIGN_UNIT, 0, "pointer not aligned");

            slot.p = p;
            slot.sz = sz;
            slot.stamp = (i as u32).wrapping_mul(2654435761);
            slot.live = true;

            fill_pattern(p, sz, slot.stamp);
            assert!(check_pattern(p, sz, slot.stamp), "pattern write check failed");
        }
        live_bytes += sz;
    }
    println!(
        "Phase1 alloc: items={} live_bytes={} time={:.2}ms",
        N_ALLOC,
        live_bytes,
        elapsed_ms(t)
    );
    print_stats("after alloc");

    // Phase 2: resize a share of the live blocks, checking the
    // min(old, new) preservation rule.
    let t = Instant::now();
    let mut realloc_ok = 0usize;
    for slot in slots.iter_mut() {
        if !slot.live || rng.below(100) >= REALLOC_RATE {
            continue;
        }
        let old_sz = slot.sz;
        let old_stamp = slot.stamp;
        unsafe {
            assert!(
                check_pattern(slot.p, old_sz, old_stamp),
                "pattern corrupted before realloc"
            );

            let new_sz = if rng.below(2) == 1 {
                rng.below(MAX_SZ * 4) + 1
            } else {
                rng.below(MAX_SZ) + 1
            };

            let np = HEAP.realloc(slot.p, new_sz);
            assert!(!np.is_null(), "realloc({}) failed", new_sz);
            assert_eq!(np as usize % ALIGN_UNIT, 0, "realloc pointer not aligned");

            let keep = old_sz.min(new_sz);
            assert_eq!(np.read(), 0xAB, "first marker lost across realloc");
            if new_sz >= old_sz {
                if old_sz >= 2 {
                    assert_eq!(np.add(old_sz - 1).read(), 0xCD, "old end marker lost on grow");
                }
            } else if keep >= 3 {
                let b = (old_stamp & 0xFF) as u8;
                let body = std::slice::from_raw_parts(np, keep);
                assert!(
                    body[1..keep - 1].iter().all(|&x| x == b),
                    "interior byte changed on shrink"
                );
            }

            slot.p = np;
            slot.sz = new_sz;
            slot.stamp ^= 0xA5A5A5A5;
            fill_pattern(np, new_sz, slot.stamp);
            assert!(
                check_pattern(np, new_sz, slot.stamp),
                "pattern check failed after realloc"
            );
        }
        realloc_ok += 1;
    }
    println!(
        "Phase2 realloc: applied={} time={:.2}ms",
        realloc_ok,
        elapsed_ms(t)
    );
    print_stats("after realloc batch");

    // Phase 3: partial release.
    let t = Instant::now();
    let mut freed_cnt = 0usize;
    let mut freed_bytes = 0usize;
    for slot in slots.iter_mut() {
        if !slot.live || rng.below(100) >= FREE_RATE {
            continue;
        }
        unsafe {
            assert!(
                check_pattern(slot.p, slot.sz, slot.stamp),
                "pattern corrupted before free"
            );
            HEAP.free(slot.p);
        }
        slot.live = false;
        freed_cnt += 1;
        freed_bytes += slot.sz;
    }
    println!(
        "Phase3 partial free: freed={} bytes={} time={:.2}ms",
        freed_cnt,
        freed_bytes,
        elapsed_ms(t)
    );
    print_stats("after partial free");

    // Phase 4: mixed churn over random slots.
    let t = Instant::now();
    let mut churn_ops = 0usize;
    for it in 0..CHURN_ITERS {
        let i = rng.below(N_ALLOC);
        match rng.below(3) {
            0 => {
                if !slots[i].live {
                    let sz = rng.below(MAX_SZ) + 1;
                    unsafe {
                        let p = HEAP.malloc(sz);
                        if p.is_null() {
                            continue;
                        }
                        assert_eq!(p as usize % ALIGN_UNIT, 0, "churn alloc not aligned");
                        slots[i].p = p;
                        slots[i].sz = sz;
                        slots[i].stamp = (i as u32).wrapping_mul(1103515245).wrapping_add(it as u32);
                        slots[i].live = true;
                        fill_pattern(p, sz, slots[i].stamp);
                        assert!(check_pattern(p, sz, slots[i].stamp), "churn alloc pattern");
                    }
                    churn_ops += 1;
                }
            }
            1 => {
                if slots[i].live {
                    unsafe {
                        assert!(
                            check_pattern(slots[i].p, slots[i].sz, slots[i].stamp),
                            "churn pre-free pattern"
                        );
                        HEAP.free(slots[i].p);
                    }
                    slots[i].live = false;
                    churn_ops += 1;
                }
            }
            _ => {
                if slots[i].live {
                    let new_sz = rng.below(MAX_SZ * 2) + 1;
                    unsafe {
                        assert!(
                            check_pattern(slots[i].p, slots[i].sz, slots[i].stamp),
                            "churn pre-realloc pattern"
                        );
                        let np = HEAP.realloc(slots[i].p, new_sz);
                        if np.is_null() {
                            continue;
                        }
                        assert_eq!(np as usize % ALIGN_UNIT, 0, "churn realloc not aligned");
                        slots[i].p = np;
                        slots[i].sz = new_sz;
                        slots[i].stamp ^= 0x5A5A5A5A;
                        fill_pattern(np, new_sz, slots[i].stamp);
                        assert!(check_pattern(np, new_sz, slots[i].stamp), "churn post-realloc pattern");
                    }
                    churn_ops += 1;
                }
            }
        }
    }
    println!("Phase4 churn: ops={} time={:.2}ms", churn_ops, elapsed_ms(t));
    print_stats("after churn");

    // Phase 5: release everything and verify the wreckage coalesced.
    let t = Instant::now();
    let mut live_left = 0usize;
    for slot in slots.iter_mut() {
        if slot.live {
            unsafe {
                assert!(
                    check_pattern(slot.p, slot.sz, slot.stamp),
                    "pattern corrupted before final free"
                );
                HEAP.free(slot.p);
            }
            slot.live = false;
            live_left += 1;
        }
    }
    println!(
        "Phase5 cleanup: freed_left={} time={:.2}ms",
        live_left,
        elapsed_ms(t)
    );
    print_stats("end");

    let report = HEAP.verify();
    assert!(report.is_ok(), "heap inconsistent after churn: {:?}", report);
    assert_eq!(
        report.free_blocks, report.blocks,
        "blocks left live after cleanup"
    );
    println!(
        "verified: {} arenas, {} blocks, all free",
        report.arenas, report.blocks
    );
}
