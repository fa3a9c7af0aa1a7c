//! Developer-facing heap diagnostics: a whole-arena invariant scan that
//! reports violations instead of aborting, and dump routines for eyeballing
//! the arena and the lists. Everything here is read-only.

use crate::block::Block;
use crate::heap::Heap;
use crate::util::{is_aligned, ALIGNMENT, MIN_BLOCK, WORD};

/// Result of a whole-heap invariant scan. Every counter past the census
/// fields is a class of violation; a healthy heap reports zeroes.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub blocks_walked: usize,
    pub free_blocks: usize,
    pub alloc_blocks: usize,
    pub errors_found: usize,
    /// Block sizes that are unaligned, undersized, or run off the arena.
    pub size_violations: usize,
    /// `NEXT_ALLOC`/`PREV_ALLOC` bits disagreeing with a neighbor's state.
    pub neighbor_flag_mismatches: usize,
    /// Free blocks whose footer word does not mirror the header.
    pub footer_mismatches: usize,
    /// Physically adjacent free blocks (coalescing failed).
    pub adjacent_free_pairs: usize,
    /// Allocated blocks whose trailing guard bytes are damaged.
    pub guard_failures: usize,
    /// Allocated blocks whose self-address back-pointer is wrong.
    pub identity_failures: usize,
    /// List membership or census disagreements.
    pub list_mismatches: usize,
    /// Statistics counters disagreeing with the live-block census.
    pub stats_mismatches: usize,
    /// The arena walk hit a corrupt size and stopped early.
    pub walk_truncated: bool,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.errors_found == 0 && !self.walk_truncated
    }
}

/// Walk the arena from prologue to epilogue and both lists, checking every
/// structural invariant the allocator promises. Assumes the heap's lists
/// are well formed enough to terminate; the arena walk itself is bounded.
pub fn check_heap(heap: &Heap) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    let arena = heap.arena();
    let stats = heap.statistics();
    let epilogue = arena.epilogue();
    let max_blocks = arena.size() / MIN_BLOCK + 2;

    let mut active_bytes: u64 = 0;

    unsafe {
        let mut block = arena.prologue();
        loop {
            let size = block.size();
            let is_sentinel = block == arena.prologue();
            if !is_sentinel
                && (size < MIN_BLOCK
                    || !is_aligned(size, ALIGNMENT)
                    || !arena.contains_range(block.addr(), size))
            {
                report.size_violations += 1;
                report.errors_found += 1;
                report.walk_truncated = true;
                break;
            }

            let next = block.next();

            // Both boundary-tag relations with the successor, epilogue
            // included.
            if block.is_next_alloc() != next.is_alloc() {
                report.neighbor_flag_mismatches += 1;
                report.errors_found += 1;
            }
            if next.is_prev_alloc() != block.is_alloc() {
                report.neighbor_flag_mismatches += 1;
                report.errors_found += 1;
            }

            if !is_sentinel {
                report.blocks_walked += 1;
                if block.is_alloc() {
                    report.alloc_blocks += 1;
                    let req = block.requested_size() as usize;
                    if block.self_addr() != block.header() {
                        report.identity_failures += 1;
                        report.errors_found += 1;
                    }
                    if req + 2 * WORD > size || !block.guard_intact(req) {
                        report.guard_failures += 1;
                        report.errors_found += 1;
                    }
                    let payload = block.payload() as usize;
                    if payload < stats.heap_min || payload + req > stats.heap_max {
                        report.stats_mismatches += 1;
                        report.errors_found += 1;
                    }
                    active_bytes += req as u64;
                } else {
                    report.free_blocks += 1;
                    if *block.footer() != *block.header() {
                        report.footer_mismatches += 1;
                        report.errors_found += 1;
                    }
                    if !next.is_alloc() {
                        report.adjacent_free_pairs += 1;
                        report.errors_found += 1;
                    }
                }
            }

            if next == epilogue {
                break;
            }
            if report.blocks_walked > max_blocks {
                report.walk_truncated = true;
                report.errors_found += 1;
                break;
            }
            block = next;
        }

        // The lists must partition exactly the blocks the walk saw.
        let mut free_count = 0;
        for member in heap.free_list().iter() {
            if member.is_alloc() {
                report.list_mismatches += 1;
                report.errors_found += 1;
            }
            free_count += 1;
            if free_count > max_blocks {
                report.walk_truncated = true;
                report.errors_found += 1;
                break;
            }
        }
        let mut alloc_count = 0;
        for member in heap.alloc_list().iter() {
            if !member.is_alloc() {
                report.list_mismatches += 1;
                report.errors_found += 1;
            }
            alloc_count += 1;
            if alloc_count > max_blocks {
                report.walk_truncated = true;
                report.errors_found += 1;
                break;
            }
        }
        if free_count != report.free_blocks || alloc_count != report.alloc_blocks {
            report.list_mismatches += 1;
            report.errors_found += 1;
        }
    }

    if stats.nactive != report.alloc_blocks as u64 || stats.active_size != active_bytes {
        report.stats_mismatches += 1;
        report.errors_found += 1;
    }

    report
}

/// Dump every block in arena order to stderr, prologue and epilogue
/// included. Developer-only; assumes an intact heap.
pub fn dump_heap(heap: &Heap) {
    let arena = heap.arena();
    let epilogue = arena.epilogue();
    eprintln!("================================================");
    unsafe {
        let mut block = arena.first_block();
        let mut index = 0;
        while block != epilogue {
            let size = block.size();
            if size == 0 || !is_aligned(size, WORD) {
                eprintln!("block {}: corrupt size {} at {:p}", index, size, block.header());
                break;
            }
            eprintln!(
                "block {}: {} header {:p} size {} prev {} next {}",
                index,
                if block.is_alloc() { "ALLOC" } else { "FREE" },
                block.header(),
                size,
                if block.is_prev_alloc() { "ALLOC" } else { "FREE" },
                if block.is_next_alloc() { "ALLOC" } else { "FREE" },
            );
            index += 1;
            block = block.next();
        }
    }
    eprintln!("================================================");
}

/// Dump the free list in link order to stderr.
pub fn dump_free_list(heap: &Heap) {
    dump_list("FREE", unsafe { heap.free_list().iter() });
}

/// Dump the alloc list in link order to stderr.
pub fn dump_alloc_list(heap: &Heap) {
    dump_list("ALLOC", unsafe { heap.alloc_list().iter() });
}

fn dump_list(title: &str, iter: crate::list::ListIter) {
    // Cap the walk so a cyclic list still terminates.
    const MAX_DUMP: usize = 50;
    eprintln!("==================== {} LIST ====================", title);
    for (index, block) in iter.take(MAX_DUMP).enumerate() {
        unsafe {
            eprintln!(
                "block {}: {} header {:p} size {} list_prev {:?} list_next {:?}",
                index,
                if block.is_alloc() { "ALLOC" } else { "FREE" },
                block.header(),
                block.size(),
                block.list_prev().map(Block::header),
                block.list_next().map(Block::header),
            );
        }
    }
    eprintln!("=================================================");
}
