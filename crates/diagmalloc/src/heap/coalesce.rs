//! Coalescer: merge a just-freed block with free physical neighbors so no
//! two free blocks are ever adjacent.

use super::Heap;
use crate::block::{Block, NEXT_ALLOC_BIT, PREV_ALLOC_BIT};

impl Heap {
    /// Free `block`, merging it with its free neighbors, and push the
    /// result on the free-list head. Returns the merged block.
    ///
    /// The neighbor status bits tell us which of the four cases applies;
    /// each case XORs exactly the bits that changed into the neighbors
    /// that can see them.
    ///
    /// # Safety
    /// `block` must be a valid allocated block that is on no list.
    pub(super) unsafe fn coalesce(&mut self, block: Block) -> Block {
        let prev_alloc = block.is_prev_alloc();
        let next_alloc = block.is_next_alloc();
        let size = block.size();

        let merged = match (prev_alloc, next_alloc) {
            (true, true) => {
                block.set_header_and_footer(size, PREV_ALLOC_BIT | NEXT_ALLOC_BIT);
                block.toggle_next_flags(PREV_ALLOC_BIT);
                block.toggle_prev_flags(NEXT_ALLOC_BIT);
                block
            }
            (true, false) => {
                let merged = self.absorb_next(block);
                merged.toggle_prev_flags(NEXT_ALLOC_BIT);
                merged
            }
            (false, true) => {
                let merged = self.absorb_prev(block);
                merged.toggle_next_flags(PREV_ALLOC_BIT);
                merged
            }
            (false, false) => {
                let merged = self.absorb_prev(block);
                self.absorb_next(merged)
            }
        };

        self.free_list.push_front(merged);
        merged
    }

    /// Merge `block` with its free successor. The successor leaves the
    /// free list; the combined block keeps `block`'s header. The caller
    /// re-lists and re-stamps the result.
    ///
    /// # Safety
    /// `block`'s physical successor must be a member of the free list.
    pub(super) unsafe fn absorb_next(&mut self, block: Block) -> Block {
        let next = block.next();
        let size = block.size() + next.size();
        self.free_list.unlink(next);
        block.set_header_and_footer(size, PREV_ALLOC_BIT | NEXT_ALLOC_BIT);
        block
    }

    /// Merge `block` with its free predecessor. The predecessor leaves
    /// the free list; the combined block keeps the predecessor's header.
    ///
    /// # Safety
    /// `block`'s physical predecessor must be a member of the free list.
    pub(super) unsafe fn absorb_prev(&mut self, block: Block) -> Block {
        let prev = block.prev();
        let size = block.size() + prev.size();
        self.free_list.unlink(prev);
        prev.set_header_and_footer(size, PREV_ALLOC_BIT | NEXT_ALLOC_BIT);
        prev
    }
}
