//! The backing arena: one fixed anonymous mapping bounded by sentinel
//! blocks.
//!
//! Layout after initialization (word indices):
//!
//! ```text
//! 0              unused, keeps payloads 16-byte aligned
//! 1..=2          prologue: allocated, two words, header mirrored in footer
//! 3..            one free block covering everything up to the epilogue
//! last           epilogue: allocated, size 0, header only
//! ```
//!
//! The sentinels are never on any list and never move; they exist so the
//! coalescer and the arena walk have no edge cases at either end.

use crate::block::{Block, ALLOC_BIT, NEXT_ALLOC_BIT, PREV_ALLOC_BIT};
use crate::platform;
use crate::util::{ARENA_SIZE, WORD};

pub struct Arena {
    base: *mut u8,
    size: usize,
}

impl Arena {
    /// Map the arena and lay down the prologue, the initial free block,
    /// and the epilogue. Returns `None` if the mapping fails.
    pub fn new() -> Option<Arena> {
        let base = unsafe { platform::map_anonymous(ARENA_SIZE) };
        if base.is_null() {
            return None;
        }
        let arena = Arena {
            base,
            size: ARENA_SIZE,
        };

        unsafe {
            let prologue = arena.prologue();
            let prologue_size = 2 * WORD;
            prologue.set_header_and_footer(prologue_size, ALLOC_BIT | PREV_ALLOC_BIT);

            let free = prologue.next();
            let free_size = ARENA_SIZE - prologue_size - 2 * WORD;
            free.set_header_and_footer(free_size, PREV_ALLOC_BIT | NEXT_ALLOC_BIT);
            free.set_list_next(None);
            free.set_list_prev(None);

            let epilogue = free.next();
            *epilogue.header() = ALLOC_BIT | NEXT_ALLOC_BIT;
            debug_assert!(epilogue.header() == arena.epilogue().header());
        }

        Some(arena)
    }

    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The allocated sentinel at the bottom of the arena (word index 1).
    #[inline]
    pub fn prologue(&self) -> Block {
        Block::from_header(unsafe { (self.base as *mut usize).add(1) })
    }

    /// The size-0 allocated sentinel in the arena's last word.
    #[inline]
    pub fn epilogue(&self) -> Block {
        Block::from_header(unsafe { (self.base as *mut usize).add(self.size / WORD - 1) })
    }

    /// The first real block (right after the prologue). Immediately after
    /// [`Arena::new`] this is the single free block spanning the arena.
    ///
    /// # Safety
    /// The prologue header must be intact (always, once the arena exists).
    #[inline]
    pub unsafe fn first_block(&self) -> Block {
        self.prologue().next()
    }

    /// Whether `[addr, addr + len)` lies entirely inside the mapping.
    /// Used by the validator to bound probes derived from untrusted words.
    #[inline]
    pub fn contains_range(&self, addr: usize, len: usize) -> bool {
        let start = self.base as usize;
        let end = start + self.size;
        addr >= start && addr <= end && len <= end - addr
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { platform::unmap(self.base, self.size) };
    }
}
