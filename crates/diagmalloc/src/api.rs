//! Classical free-function allocator API over the process-global heap.
//!
//! Each entry point captures its caller's source location through
//! `#[track_caller]`; the `*_at` variants take an explicit [`AllocSite`]
//! instead. All of them forward to [`Heap`](crate::heap::Heap) methods
//! under the global lock.

use crate::init::with_heap;
use crate::site::AllocSite;
use crate::stats::Statistics;
use core::ptr;

/// Allocate `sz` bytes from the global heap, tagged with the call site.
#[track_caller]
pub fn malloc(sz: usize) -> *mut u8 {
    malloc_at(sz, AllocSite::caller())
}

/// As [`malloc`], with an explicit call site.
pub fn malloc_at(sz: usize, site: AllocSite) -> *mut u8 {
    with_heap(|heap| heap.malloc_at(sz, site)).unwrap_or(ptr::null_mut())
}

/// Allocate zeroed room for `count` elements of `sz` bytes each.
#[track_caller]
pub fn calloc(count: usize, sz: usize) -> *mut u8 {
    calloc_at(count, sz, AllocSite::caller())
}

/// As [`calloc`], with an explicit call site.
pub fn calloc_at(count: usize, sz: usize, site: AllocSite) -> *mut u8 {
    with_heap(|heap| heap.calloc_at(count, sz, site)).unwrap_or(ptr::null_mut())
}

/// Free `ptr` on the global heap. Null is a no-op; invalid pointers are
/// diagnosed on stderr and left alone.
///
/// # Safety
/// If `ptr` is a live allocation from the global heap, the caller must not
/// use it afterwards.
#[track_caller]
pub unsafe fn free(ptr: *mut u8) {
    free_at(ptr, AllocSite::caller());
}

/// As [`free`], with an explicit call site.
///
/// # Safety
/// As for [`free`].
pub unsafe fn free_at(ptr: *mut u8, site: AllocSite) {
    let _ = with_heap(|heap| unsafe { heap.free_at(ptr, site) });
}

/// Resize the allocation at `ptr` on the global heap.
///
/// # Safety
/// If `ptr` is a live allocation from the global heap and the call returns
/// non-null, the caller must only use the returned pointer afterwards.
#[track_caller]
pub unsafe fn realloc(ptr: *mut u8, new_size: usize) -> *mut u8 {
    realloc_at(ptr, new_size, AllocSite::caller())
}

/// As [`realloc`], with an explicit call site.
///
/// # Safety
/// As for [`realloc`].
pub unsafe fn realloc_at(ptr: *mut u8, new_size: usize, site: AllocSite) -> *mut u8 {
    with_heap(|heap| unsafe { heap.realloc_at(ptr, new_size, site) }).unwrap_or(ptr::null_mut())
}

/// Snapshot of the global heap's statistics.
pub fn statistics() -> Statistics {
    with_heap(|heap| heap.statistics()).unwrap_or_else(Statistics::new)
}

/// Print the two-line statistics summary for the global heap to stdout.
pub fn print_statistics() {
    statistics().print();
}

/// Print the leak report for the global heap to stdout.
pub fn print_leak_report() {
    let _ = with_heap(|heap| heap.print_leak_report());
}
