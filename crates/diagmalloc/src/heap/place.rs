//! Placement engine: first-fit search over the free list and the
//! split-or-keep decision.

use super::Heap;
use crate::block::{Block, ALLOC_BIT, NEXT_ALLOC_BIT, PREV_ALLOC_BIT};
use crate::util::{MIN_BLOCK, WORD};

impl Heap {
    /// First free block whose size satisfies `asize`, in list order.
    ///
    /// # Safety
    /// The free list must be well formed.
    pub(super) unsafe fn find_fit(&self, asize: usize) -> Option<Block> {
        self.free_list.iter().find(|block| block.size() >= asize)
    }

    /// Turn the free `block` into an allocated block of `asize` bytes.
    ///
    /// If the leftover can carry a whole block it is split off as a new
    /// free block after the allocation; otherwise the allocation keeps the
    /// full size. Either way the physical neighbors' status bits are
    /// brought up to date and the block lands on the alloc-list head.
    ///
    /// # Safety
    /// `block` must be a member of the free list with `size >= asize`;
    /// `asize` must be an aligned block size.
    pub(super) unsafe fn place(&mut self, block: Block, asize: usize) {
        self.free_list.unlink(block);
        let size = block.size();

        if size - asize >= MIN_BLOCK {
            // Split: the remainder becomes a new free block after us. It
            // sits between the allocation and the old successor, which
            // must be allocated (no two free blocks are adjacent).
            let remainder = Block::from_header(block.header().add(asize / WORD));
            remainder.set_header_and_footer(size - asize, PREV_ALLOC_BIT | NEXT_ALLOC_BIT);
            self.free_list.push_front(remainder);
            block.set_header_and_footer(asize, ALLOC_BIT | PREV_ALLOC_BIT);
        } else {
            block.set_header_and_footer(size, ALLOC_BIT | PREV_ALLOC_BIT | NEXT_ALLOC_BIT);
            // The successor's predecessor just became allocated.
            block.toggle_next_flags(PREV_ALLOC_BIT);
        }

        // The predecessor's successor just became allocated.
        block.toggle_prev_flags(NEXT_ALLOC_BIT);
        self.alloc_list.push_front(block);
    }
}
