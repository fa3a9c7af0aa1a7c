//! Realloc planner behavior: in-place expansion through free neighbors,
//! in-place contraction with a tail split, the copying fallback, and data
//! preservation across all of them.

use diagmalloc::block::Block;
use diagmalloc::heap::Heap;
use diagmalloc::self_check;
use diagmalloc::util::MIN_BLOCK;

fn heap() -> Heap {
    Heap::new().expect("arena mapping failed")
}

#[test]
fn realloc_null_behaves_like_malloc() {
    let mut h = heap();
    let p = unsafe { h.realloc(std::ptr::null_mut(), 128) };
    assert!(!p.is_null());
    assert_eq!(h.statistics().ntotal, 1);
    unsafe { h.free(p) };
}

#[test]
fn realloc_to_zero_returns_null_and_keeps_the_block() {
    let mut h = heap();
    let p = h.malloc(64);
    assert!(!p.is_null());
    unsafe { std::ptr::write_bytes(p, 0x42, 64) };

    let q = unsafe { h.realloc(p, 0) };
    assert!(q.is_null());

    // The original allocation is untouched and still freeable.
    assert_eq!(h.statistics().nactive, 1);
    let slice = unsafe { std::slice::from_raw_parts(p, 64) };
    assert!(slice.iter().all(|&b| b == 0x42));
    unsafe { h.free(p) };
    assert_eq!(h.statistics().nactive, 0);
}

#[test]
fn realloc_to_same_request_returns_same_pointer() {
    let mut h = heap();
    let p = h.malloc(100);
    assert!(!p.is_null());
    let q = unsafe { h.realloc(p, 100) };
    assert_eq!(p, q);
    assert!(self_check::check_heap(&h).is_ok());
    unsafe { h.free(q) };
}

#[test]
fn grow_into_free_successor_keeps_the_pointer() {
    let mut h = heap();
    // Only allocation: the rest of the arena is one free successor.
    let p = h.malloc(100);
    assert!(!p.is_null());
    unsafe { std::ptr::write_bytes(p, b'Q', 100) };

    let q = unsafe { h.realloc(p, 400) };
    // Absorbing the successor needs no copy and no move.
    assert_eq!(p, q);
    let slice = unsafe { std::slice::from_raw_parts(q, 100) };
    assert!(slice.iter().all(|&b| b == b'Q'));
    assert!(self_check::check_heap(&h).is_ok());
    unsafe { h.free(q) };
}

#[test]
fn grow_absorbs_free_predecessor_region() {
    let mut h = heap();
    let mut ptrs = Vec::new();
    for _ in 0..10 {
        let p = h.malloc(100);
        assert!(!p.is_null());
        ptrs.push(p);
    }
    // Carve a free hole just before p5.
    unsafe {
        h.free(ptrs[3]);
        h.free(ptrs[4]);
    }
    unsafe { std::ptr::write_bytes(ptrs[5], b'R', 100) };

    let old_block = Block::from_payload(ptrs[5]);
    let successor_before = unsafe { old_block.next() };

    let q = unsafe { h.realloc(ptrs[5], 150) };
    assert!(!q.is_null());
    // Grown in place by sliding into the hole: the pointer moved down,
    // and the block still ends where it used to, so p6 is untouched.
    assert!((q as usize) < (ptrs[5] as usize));
    let new_block = Block::from_payload(q);
    unsafe {
        assert!(new_block.is_alloc());
        assert_eq!(new_block.next(), successor_before);
        // The leftover in front is a real free block.
        let leftover = new_block.prev();
        assert!(!leftover.is_alloc());
        assert!(leftover.size() >= MIN_BLOCK);
    }
    let slice = unsafe { std::slice::from_raw_parts(q, 100) };
    assert!(slice.iter().all(|&b| b == b'R'));

    let report = self_check::check_heap(&h);
    assert!(report.is_ok(), "after realloc: {:?}", report);

    unsafe {
        h.free(q);
        for &p in &ptrs[..3] {
            h.free(p);
        }
        for &p in &ptrs[6..] {
            h.free(p);
        }
    }
    assert!(self_check::check_heap(&h).is_ok());
}

#[test]
fn grow_with_blocked_neighbors_moves_and_copies() {
    let mut h = heap();
    let p1 = h.malloc(100);
    assert!(!p1.is_null());
    unsafe { std::ptr::write_bytes(p1, b'A', 100) };
    // Block the successor so in-place growth is impossible.
    let blocker = h.malloc(100);
    assert!(!blocker.is_null());

    let p2 = unsafe { h.realloc(p1, 200) };
    assert!(!p2.is_null());
    assert_ne!(p1, p2);
    let slice = unsafe { std::slice::from_raw_parts(p2, 100) };
    assert!(slice.iter().all(|&b| b == b'A'));

    assert!(self_check::check_heap(&h).is_ok());
    unsafe {
        h.free(p2);
        h.free(blocker);
    }
}

#[test]
fn shrink_keeps_pointer_and_prefix() {
    let mut h = heap();
    let p = h.malloc(100);
    assert!(!p.is_null());
    unsafe { std::ptr::write_bytes(p, b'B', 100) };

    let q = unsafe { h.realloc(p, 50) };
    assert_eq!(p, q);
    let slice = unsafe { std::slice::from_raw_parts(q, 50) };
    assert!(slice.iter().all(|&b| b == b'B'));
    assert!(self_check::check_heap(&h).is_ok());
    unsafe { h.free(q) };
    assert!(self_check::check_heap(&h).is_ok());
}

#[test]
fn shrink_with_allocated_successor_lists_the_tail() {
    let mut h = heap();
    let p = h.malloc(300);
    assert!(!p.is_null());
    // Pin an allocated block right after, so the split-off tail cannot
    // merge anywhere and must stand alone on the free list.
    let pin = h.malloc(100);
    assert!(!pin.is_null());

    let q = unsafe { h.realloc(p, 60) };
    assert_eq!(p, q);

    let report = self_check::check_heap(&h);
    assert!(report.is_ok(), "after shrink: {:?}", report);
    // The tail and the arena remainder are both listed.
    assert_eq!(report.free_blocks, 2);
    assert_eq!(h.statistics().active_size, 160);

    unsafe {
        h.free(q);
        h.free(pin);
    }
    assert!(self_check::check_heap(&h).is_ok());
}

#[test]
fn stale_pointer_after_forced_move_is_rejected() {
    let mut h = heap();
    let p1 = h.malloc(100);
    let p2 = h.malloc(100);
    let p3 = h.malloc(8 << 19);
    assert!(!p1.is_null() && !p2.is_null() && !p3.is_null());

    // Neither neighbor of p2 is free: realloc must take the move path.
    let p4 = unsafe { h.realloc(p2, 500) };
    assert!(!p4.is_null());
    assert_ne!(p2, p4);

    unsafe {
        h.free(p1);
        h.free(p3);
        h.free(p4);
    }
    let stats = h.statistics();
    assert_eq!(stats.nactive, 0);

    // p2 went stale when realloc moved it; freeing it again is diagnosed
    // and changes nothing.
    unsafe { h.free(p2) };
    assert_eq!(h.statistics(), stats);
    let report = self_check::check_heap(&h);
    assert!(report.is_ok(), "after stale free: {:?}", report);
}

#[test]
fn exhausted_fallback_returns_null_and_keeps_original() {
    let mut h = heap();
    let p = h.malloc(64);
    assert!(!p.is_null());
    unsafe { std::ptr::write_bytes(p, 0x77, 64) };
    // Block in-place growth, then ask for more than the arena holds.
    let blocker = h.malloc(64);
    assert!(!blocker.is_null());

    let q = unsafe { h.realloc(p, 9 << 20) };
    assert!(q.is_null());

    // Failure path: counted, original untouched.
    assert_eq!(h.statistics().nfail, 1);
    let slice = unsafe { std::slice::from_raw_parts(p, 64) };
    assert!(slice.iter().all(|&b| b == 0x77));
    assert!(self_check::check_heap(&h).is_ok());
    unsafe {
        h.free(p);
        h.free(blocker);
    }
}

#[test]
fn million_grow_steps_stay_consistent() {
    let mut h = heap();
    let mut p = h.malloc(1);
    assert!(!p.is_null());

    for i in 0..1_000_000usize {
        p = unsafe { h.realloc(p, i + 2) };
        assert!(!p.is_null(), "realloc to {} failed", i + 2);
    }

    unsafe { h.free(p) };
    let report = self_check::check_heap(&h);
    assert!(report.is_ok(), "after realloc storm: {:?}", report);
    assert_eq!(h.statistics().nactive, 0);
    assert_eq!(report.free_blocks, 1);
}
