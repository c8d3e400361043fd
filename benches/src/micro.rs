//! Microbenchmarks for the chain heap.
//!
//! A plain binary rather than a criterion harness: timings come from
//! `Instant` around tight loops, with `black_box` keeping the calls live.
//! Build with `--release`; first-fit scan costs dominate debug builds.

use chainmalloc::LockedHeap;
use std::hint::black_box;
use std::time::Instant;

static HEAP: LockedHeap = LockedHeap::new();

/// Measure malloc/free latency for a given size, N iterations.
fn bench_malloc_free(size: usize, iterations: usize) -> f64 {
    // Warmup
    for _ in 0..1000 {
        unsafe {
            let ptr = HEAP.malloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            HEAP.free(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = HEAP.malloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, std::cmp::min(size, 64));
            HEAP.free(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure a realloc growing ladder.
fn bench_realloc_grow(iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let mut ptr = HEAP.malloc(black_box(16));
            for &size in black_box(&[32usize, 64, 128, 256, 512, 1024]) {
                ptr = HEAP.realloc(black_box(ptr), size);
            }
            HEAP.free(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure throughput with all threads contending on the one heap lock.
fn bench_threaded_throughput(num_threads: usize, ops_per_thread: usize, size: usize) -> f64 {
    let start = Instant::now();
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            std::thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    unsafe {
                        let ptr = HEAP.malloc(black_box(size));
                        std::ptr::write_bytes(ptr, 0xCD, std::cmp::min(size, 16));
                        HEAP.free(black_box(ptr));
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    let elapsed = start.elapsed();
    let total_ops = num_threads * ops_per_thread;
    total_ops as f64 / elapsed.as_secs_f64() // ops/sec
}

fn main() {
    let iterations = 1_000_000;

    println!("=== chainmalloc microbenchmarks ===\n");

    let mut latencies: Vec<(usize, f64)> = Vec::new();
    let mut key_throughput_1t = 0.0f64;
    let mut key_throughput_4t = 0.0f64;

    println!("--- malloc/free latency (ns/op) ---");
    for &size in &[16, 32, 64, 128, 256, 512, 1024, 4096, 16384, 65536, 262144] {
        let ns = bench_malloc_free(size, iterations);
        println!("  size={:>8}: {:>8.1} ns", size, ns);
        latencies.push((size, ns));
    }

    println!("\n--- realloc grow pattern (ns/op) ---");
    let ns = bench_realloc_grow(iterations / 10);
    println!("  16->1024: {:.1} ns", ns);

    println!("\n--- multi-threaded throughput (Mops/sec) ---");
    for &threads in &[1, 2, 4, 8] {
        let ops_sec = bench_threaded_throughput(threads, iterations / threads, 64);
        let mops = ops_sec / 1_000_000.0;
        println!("  threads={}: {:>6.2} Mops/sec", threads, mops);
        if threads == 1 {
            key_throughput_1t = mops;
        }
        if threads == 4 {
            key_throughput_4t = mops;
        }
    }

    println!("\n--- memory overhead ---");
    // Hold many small blocks live and compare the heap's own growth figure
    // against the bytes requested.
    let mut ptrs = Vec::new();
    let count = 20_000;
    let alloc_size = 64;
    let requested = count * alloc_size;

    for _ in 0..count {
        unsafe {
            let ptr = HEAP.malloc(alloc_size);
            if !ptr.is_null() {
                std::ptr::write_bytes(ptr, 0, alloc_size);
                ptrs.push(ptr);
            }
        }
    }

    let stats = HEAP.stats();
    println!(
        "  {} allocs x {} bytes = {} bytes requested",
        count, alloc_size, requested
    );
    println!(
        "  heap total: {} bytes across {} arenas ({:.2}x overhead)",
        stats.total_bytes,
        stats.arenas,
        stats.total_bytes as f64 / requested as f64
    );

    for ptr in ptrs {
        unsafe { HEAP.free(ptr) };
    }

    let report = HEAP.verify();
    assert!(report.is_ok(), "heap inconsistent after benchmarks: {:?}", report);

    // Print machine-parseable summary line
    print!("\nSUMMARY|chainmalloc");
    for &(size, ns) in &latencies {
        print!("|latency_{}={:.1}", size, ns);
    }
    println!(
        "|throughput_1t={:.2}|throughput_4t={:.2}",
        key_throughput_1t, key_throughput_4t
    );

    println!("\nDone.");
}
