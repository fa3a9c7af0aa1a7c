//! Microbenchmarks for diagmalloc's free-function API over the global
//! heap. Run with `cargo run --release -p diagmalloc-benches --bin micro`.

use diagmalloc::api;
use std::hint::black_box;
use std::time::Instant;

/// Measure malloc/free latency for a given size, N iterations.
fn bench_malloc_free(size: usize, iterations: usize) -> f64 {
    // Warmup
    for _ in 0..1000 {
        unsafe {
            let ptr = api::malloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, size.min(64));
            api::free(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = api::malloc(black_box(size));
            std::ptr::write_bytes(ptr, 0xAB, size.min(64));
            api::free(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure calloc/free latency.
fn bench_calloc_free(size: usize, iterations: usize) -> f64 {
    for _ in 0..1000 {
        unsafe {
            let ptr = api::calloc(black_box(1), black_box(size));
            api::free(black_box(ptr));
        }
    }
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let ptr = api::calloc(black_box(1), black_box(size));
            api::free(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure a realloc growth ladder.
fn bench_realloc_grow(iterations: usize) -> f64 {
    let start = Instant::now();
    for _ in 0..iterations {
        unsafe {
            let mut ptr = api::malloc(black_box(16));
            for &size in black_box(&[32usize, 64, 128, 256, 512, 1024]) {
                ptr = api::realloc(black_box(ptr), size);
            }
            api::free(black_box(ptr));
        }
    }
    let elapsed = start.elapsed();
    elapsed.as_nanos() as f64 / iterations as f64
}

/// Measure a churn workload: a working set of live blocks with rolling
/// replacement, the pattern that exercises first-fit and coalescing.
fn bench_churn(live: usize, iterations: usize) -> f64 {
    let mut slots: Vec<*mut u8> = (0..live)
        .map(|i| api::malloc(64 + (i % 7) * 48))
        .collect();
    let start = Instant::now();
    for i in 0..iterations {
        let slot = i % live;
        unsafe { api::free(slots[slot]) };
        slots[slot] = api::malloc(black_box(64 + (i % 11) * 32));
    }
    let elapsed = start.elapsed();
    for ptr in slots {
        unsafe { api::free(ptr) };
    }
    elapsed.as_nanos() as f64 / iterations as f64
}

fn main() {
    const ITERS: usize = 200_000;

    println!("diagmalloc microbenchmarks ({} iterations)", ITERS);
    for &size in &[16usize, 64, 256, 1024, 4096] {
        let ns = bench_malloc_free(size, ITERS);
        println!("malloc/free {:>6} B: {:>8.1} ns/op", size, ns);
    }
    for &size in &[64usize, 1024] {
        let ns = bench_calloc_free(size, ITERS);
        println!("calloc/free {:>6} B: {:>8.1} ns/op", size, ns);
    }
    let ns = bench_realloc_grow(ITERS / 10);
    println!("realloc ladder 16->1024: {:>8.1} ns/ladder", ns);
    let ns = bench_churn(128, ITERS);
    println!("churn (128 live): {:>8.1} ns/op", ns);

    api::print_statistics();
}
