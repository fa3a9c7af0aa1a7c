//! Realloc planner. Expansion tries, in order: absorb the free
//! predecessor, absorb the free successor, absorb both, and only then
//! allocate-copy-free. Contraction splits the tail off in place when the
//! residue can carry a block. Every in-place branch requires the leftover
//! free block to be at least `MIN_BLOCK`; an exact fit with zero leftover
//! deliberately falls through to the copying path.

use super::Heap;
use crate::block::{Block, ALLOC_BIT, NEXT_ALLOC_BIT, PREV_ALLOC_BIT};
use crate::site::AllocSite;
use crate::util::{adjusted_size, ALIGNMENT, ALLOC_META, MIN_BLOCK, WORD};
use core::ptr;

impl Heap {
    /// As [`Heap::realloc`], with an explicit call site.
    ///
    /// # Safety
    /// As for [`Heap::realloc`].
    pub unsafe fn realloc_at(&mut self, ptr: *mut u8, new_size: usize, site: AllocSite) -> *mut u8 {
        if ptr.is_null() {
            return self.malloc_at(new_size, site);
        }
        if new_size == 0 {
            return ptr::null_mut();
        }
        // Same bound as malloc: anything past it would overflow the
        // rounded block-size computation.
        if new_size > usize::MAX - (ALIGNMENT + ALLOC_META) {
            self.stats.record_fail(new_size);
            return ptr::null_mut();
        }

        let asize = adjusted_size(new_size);

        // On a validation failure the diagnostic has been printed and the
        // original allocation (if any) still belongs to the caller.
        if self.validate_free(ptr, site).is_err() {
            return ptr::null_mut();
        }

        let block = Block::from_payload(ptr);
        let old_req = block.requested_size() as usize;
        let old_size = block.size();
        let prev_avail = if block.is_prev_alloc() {
            0
        } else {
            block.prev().size()
        };
        let next_avail = if block.is_next_alloc() {
            0
        } else {
            block.next().size()
        };

        if new_size > old_req {
            self.expand(block, asize, new_size, old_req, old_size, prev_avail, next_avail, site)
        } else if new_size < old_size {
            self.contract(block, asize, new_size, old_req, old_size, site)
        } else {
            ptr
        }
    }

    /// Grow `block` to `asize`, in place if a neighbor donates enough
    /// space, otherwise through the copying fallback.
    ///
    /// # Safety
    /// `block` must be a validated live allocation; the `*_avail` sizes
    /// must describe its physical neighbors.
    #[allow(clippy::too_many_arguments)]
    unsafe fn expand(
        &mut self,
        block: Block,
        asize: usize,
        new_size: usize,
        old_req: usize,
        old_size: usize,
        prev_avail: usize,
        next_avail: usize,
        site: AllocSite,
    ) -> *mut u8 {
        let old_payload = block.payload();
        let new_block;

        if prev_avail + old_size >= asize && prev_avail + old_size - asize >= MIN_BLOCK {
            // Absorb the predecessor; the leftover becomes a free block in
            // front and the allocation shifts over its own bytes. The copy
            // goes first: the fresh boundary tags can land inside the old
            // payload when the block carried slack.
            self.alloc_list.unlink(block);
            let remainder_size = prev_avail + old_size - asize;
            let remainder_flags = block.prev().flags();
            let mut flags = ALLOC_BIT;
            if block.is_next_alloc() {
                flags |= NEXT_ALLOC_BIT;
            }
            let remainder = self.absorb_prev(block);
            new_block = Block::from_header(remainder.header().add(remainder_size / WORD));
            ptr::copy(old_payload, new_block.payload(), old_req);
            new_block.set_header_and_footer(asize, flags);
            remainder.set_header_and_footer(remainder_size, remainder_flags);
            self.free_list.push_front(remainder);
        } else if next_avail + old_size >= asize && next_avail + old_size - asize >= MIN_BLOCK {
            // Absorb the successor; the leftover becomes a free block at
            // the tail and the payload does not move, so no copy.
            self.alloc_list.unlink(block);
            let remainder_size = next_avail + old_size - asize;
            let remainder_flags = block.next().flags();
            let mut flags = ALLOC_BIT;
            if block.is_prev_alloc() {
                flags |= PREV_ALLOC_BIT;
            }
            new_block = self.absorb_next(block);
            new_block.set_header_and_footer(asize, flags);
            let remainder = new_block.next();
            remainder.set_header_and_footer(remainder_size, remainder_flags);
            self.free_list.push_front(remainder);
        } else if prev_avail + next_avail + old_size >= asize
            && prev_avail + next_avail + old_size - asize >= MIN_BLOCK
        {
            // Absorb both neighbors; the allocation starts where the
            // predecessor did and the leftover goes to the tail. The copy
            // happens before the new boundary tags go down: when the old
            // payload reaches almost to the new block's footer position,
            // stamping first would clobber the bytes being preserved.
            self.alloc_list.unlink(block);
            let remainder_size = prev_avail + next_avail + old_size - asize;
            let remainder_flags = block.next().flags();
            let merged = self.absorb_prev(block);
            new_block = self.absorb_next(merged);
            ptr::copy(old_payload, new_block.payload(), old_req);
            new_block.set_header_and_footer(asize, ALLOC_BIT | PREV_ALLOC_BIT);
            let remainder = new_block.next();
            remainder.set_header_and_footer(remainder_size, remainder_flags);
            // The block before the old predecessor now sees an allocated
            // successor.
            new_block.toggle_prev_flags(NEXT_ALLOC_BIT);
            self.free_list.push_front(remainder);
        } else {
            // No neighbor can help: allocate fresh, copy, release. If the
            // allocation fails the original block is untouched and still
            // owned by the caller.
            let new_payload = self.malloc_at(new_size, site);
            if new_payload.is_null() {
                return ptr::null_mut();
            }
            ptr::copy_nonoverlapping(old_payload, new_payload, old_req);
            self.free_at(old_payload, site);
            return new_payload;
        }

        // The in-place move counts as one free plus one alloc.
        self.stats.record_free(old_req);
        new_block.set_alloc_metadata(new_size, site);
        self.alloc_list.push_front(new_block);
        self.stats.record_malloc(new_block.payload(), new_size);
        debug_assert_eq!(new_block.requested_size() as usize, new_size);
        new_block.payload()
    }

    /// Shrink `block` to `asize` in place. If the residue can carry a
    /// block, split it off as a new free tail (coalescing it with a free
    /// successor); otherwise leave the block exactly as it is.
    ///
    /// # Safety
    /// `block` must be a validated live allocation.
    unsafe fn contract(
        &mut self,
        block: Block,
        asize: usize,
        new_size: usize,
        old_req: usize,
        old_size: usize,
        site: AllocSite,
    ) -> *mut u8 {
        if old_size - asize < MIN_BLOCK {
            return block.payload();
        }

        let tail_size = old_size - asize;
        let next_alloc = block.is_next_alloc();
        let mut flags = ALLOC_BIT;
        if block.is_prev_alloc() {
            flags |= PREV_ALLOC_BIT;
        }
        block.set_header_and_footer(asize, flags);

        let tail = block.next();
        let mut tail_flags = PREV_ALLOC_BIT;
        if next_alloc {
            tail_flags |= NEXT_ALLOC_BIT;
        }
        tail.set_header_and_footer(tail_size, tail_flags);

        // The coalescer lists the tail, merges it with a free successor,
        // and fixes both neighbors' bits. Its no-merge case toggles our
        // NEXT_ALLOC as a side effect, so re-stamp our header afterwards.
        self.coalesce(tail);
        block.set_header_and_footer(asize, flags);

        // The block stays on the alloc list; only its envelope changes.
        block.set_alloc_metadata(new_size, site);
        self.stats.record_free(old_req);
        self.stats.record_malloc(block.payload(), new_size);
        block.payload()
    }
}
