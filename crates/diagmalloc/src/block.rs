//! In-band block format.
//!
//! A block is identified by the address of its header word. The header
//! holds `size | flags`; the footer (last word of the block) mirrors it
//! for free blocks and for allocated blocks carrying the full envelope.
//! Allocated blocks additionally reserve the words just before the footer:
//!
//! ```text
//! footer - 1   forward list link
//! footer - 2   backward list link
//! footer - 3   self-address back-pointer
//! footer - 4   call-site slot (null = unknown)
//! footer - 5   requested size (low 32 bits) | caller line (high 32 bits)
//! ```
//!
//! plus an 8-byte guard written immediately after the user payload. Free
//! blocks reuse the two link slots at the same offsets, which is what makes
//! list splicing oblivious to block state.
//!
//! This module is the sole site of block pointer arithmetic; everything
//! else goes through these accessors.

use crate::site::AllocSite;
use crate::util::WORD;
use core::panic::Location;

/// Block is allocated.
pub const ALLOC_BIT: usize = 0b010;
/// The physical successor is allocated.
pub const NEXT_ALLOC_BIT: usize = 0b001;
/// The physical predecessor is allocated.
pub const PREV_ALLOC_BIT: usize = 0b100;
/// All three status bits.
pub const FLAG_MASK: usize = ALLOC_BIT | NEXT_ALLOC_BIT | PREV_ALLOC_BIT;

/// Guard bytes written immediately past each user payload. Written and
/// checked byte-wise: the guard start is only byte-aligned.
pub const MAGIC: [u8; 8] = *b"kimbora!";

/// A block, identified by its header word.
///
/// `Block` is a plain address wrapper; none of its constructors touch
/// memory. The accessors that read or write through the header are
/// `unsafe` and require the address to point at a real block inside a
/// live arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Block {
    hdr: *mut usize,
}

impl Block {
    #[inline]
    pub fn from_header(hdr: *mut usize) -> Block {
        Block { hdr }
    }

    /// The block whose payload starts at `payload`. Pure address
    /// arithmetic; `payload` may be arbitrary (the validator relies on
    /// this).
    #[inline]
    pub fn from_payload(payload: *mut u8) -> Block {
        Block {
            hdr: payload.wrapping_sub(WORD) as *mut usize,
        }
    }

    /// The block whose footer word is at `footer`.
    ///
    /// # Safety
    /// `footer` must be readable; the recovered header is only meaningful
    /// if `footer` really is a block footer.
    #[inline]
    pub unsafe fn from_footer(footer: *mut usize) -> Block {
        let size = *footer & !FLAG_MASK;
        // Written so a garbage size of 0 cannot underflow the offset.
        Block {
            hdr: footer.wrapping_add(1).wrapping_sub(size / WORD),
        }
    }

    #[inline]
    pub fn header(self) -> *mut usize {
        self.hdr
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.hdr as usize
    }

    #[inline]
    pub fn payload(self) -> *mut u8 {
        self.hdr.wrapping_add(1) as *mut u8
    }

    /// # Safety
    /// The header word must be readable.
    #[inline]
    pub unsafe fn size(self) -> usize {
        *self.hdr & !FLAG_MASK
    }

    /// # Safety
    /// The header word must be readable.
    #[inline]
    pub unsafe fn flags(self) -> usize {
        *self.hdr & FLAG_MASK
    }

    /// # Safety
    /// The header word must be readable.
    #[inline]
    pub unsafe fn is_alloc(self) -> bool {
        *self.hdr & ALLOC_BIT != 0
    }

    /// # Safety
    /// The header word must be readable.
    #[inline]
    pub unsafe fn is_prev_alloc(self) -> bool {
        *self.hdr & PREV_ALLOC_BIT != 0
    }

    /// # Safety
    /// The header word must be readable.
    #[inline]
    pub unsafe fn is_next_alloc(self) -> bool {
        *self.hdr & NEXT_ALLOC_BIT != 0
    }

    /// The physically next block in arena order.
    ///
    /// # Safety
    /// `self` must be a valid block; the successor exists for every block
    /// except the epilogue.
    #[inline]
    pub unsafe fn next(self) -> Block {
        Block {
            hdr: self.hdr.add(self.size() / WORD),
        }
    }

    /// The physically previous block, located through its footer (the word
    /// just before our header).
    ///
    /// # Safety
    /// `self` must be a valid non-prologue block, and the predecessor's
    /// footer word must be in sync with its header (always true for free
    /// predecessors and for allocated blocks carrying the full envelope).
    #[inline]
    pub unsafe fn prev(self) -> Block {
        let prev_size = *self.hdr.sub(1) & !FLAG_MASK;
        Block {
            hdr: self.hdr.sub(prev_size / WORD),
        }
    }

    /// Address of this block's footer word.
    ///
    /// # Safety
    /// `self` must be a valid block of nonzero size (the epilogue has no
    /// footer).
    #[inline]
    pub unsafe fn footer(self) -> *mut usize {
        debug_assert!(self.size() != 0);
        self.hdr.add(self.size() / WORD - 1)
    }

    /// Write `size | flags` to both the header and the footer.
    ///
    /// # Safety
    /// `self..self + size` must lie inside a live arena; `size` must be a
    /// nonzero multiple of the word size with no flag bits set.
    #[inline]
    pub unsafe fn set_header_and_footer(self, size: usize, flags: usize) {
        debug_assert!(size & FLAG_MASK == 0);
        *self.hdr = size | flags;
        *self.footer() = size | flags;
    }

    /// XOR `mask` into the physical successor's header.
    ///
    /// # Safety
    /// As for [`Block::next`]; the successor's header must be writable.
    #[inline]
    pub unsafe fn toggle_next_flags(self, mask: usize) {
        *self.next().hdr ^= mask;
    }

    /// XOR `mask` into the physical predecessor's header.
    ///
    /// # Safety
    /// As for [`Block::prev`]; the predecessor's header must be writable.
    #[inline]
    pub unsafe fn toggle_prev_flags(self, mask: usize) {
        *self.prev().hdr ^= mask;
    }

    // --- list link slots (valid for both free and allocated blocks) ---

    /// # Safety
    /// `self` must be a valid block whose link slots are initialized.
    #[inline]
    pub unsafe fn list_next(self) -> Option<Block> {
        let word = *self.footer().sub(1);
        if word == 0 {
            None
        } else {
            Some(Block::from_header(word as *mut usize))
        }
    }

    /// # Safety
    /// `self` must be a valid block whose link slots are initialized.
    #[inline]
    pub unsafe fn list_prev(self) -> Option<Block> {
        let word = *self.footer().sub(2);
        if word == 0 {
            None
        } else {
            Some(Block::from_header(word as *mut usize))
        }
    }

    /// # Safety
    /// `self` must be a valid block with room for link slots.
    #[inline]
    pub unsafe fn set_list_next(self, next: Option<Block>) {
        *self.footer().sub(1) = next.map_or(0, Block::addr);
    }

    /// # Safety
    /// `self` must be a valid block with room for link slots.
    #[inline]
    pub unsafe fn set_list_prev(self, prev: Option<Block>) {
        *self.footer().sub(2) = prev.map_or(0, Block::addr);
    }

    // --- allocated metadata envelope ---

    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn requested_size(self) -> u32 {
        *(self.footer().sub(5) as *const u32)
    }

    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn set_requested_size(self, sz: u32) {
        *(self.footer().sub(5) as *mut u32) = sz;
    }

    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn line(self) -> u32 {
        *(self.footer().sub(5) as *const u32).add(1)
    }

    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn set_line(self, line: u32) {
        *(self.footer().sub(5) as *mut u32).add(1) = line;
    }

    /// # Safety
    /// `self` must be a valid allocated block whose call-site slot was
    /// written by [`Block::set_site`].
    #[inline]
    pub unsafe fn site(self) -> AllocSite {
        AllocSite::from_raw(*self.footer().sub(4) as *const Location<'static>)
    }

    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn set_site(self, site: AllocSite) {
        *self.footer().sub(4) = site.to_raw() as usize;
    }

    /// The self-address back-pointer recorded at allocation time.
    ///
    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn self_addr(self) -> *mut usize {
        *self.footer().sub(3) as *mut usize
    }

    /// # Safety
    /// `self` must be a valid allocated block.
    #[inline]
    pub unsafe fn set_self_addr(self) {
        *self.footer().sub(3) = self.hdr as usize;
    }

    /// Write the guard bytes immediately past `sz` payload bytes.
    /// Byte-wise: the guard start is only byte-aligned.
    ///
    /// # Safety
    /// `self` must be a valid allocated block whose size covers
    /// `sz + MAGIC.len()` payload-relative bytes.
    #[inline]
    pub unsafe fn write_guard(self, sz: usize) {
        let guard = self.payload().add(sz);
        for (i, &byte) in MAGIC.iter().enumerate() {
            guard.add(i).write(byte);
        }
    }

    /// Check the guard bytes immediately past `sz` payload bytes.
    ///
    /// # Safety
    /// The `MAGIC.len()` bytes at `payload + sz` must be readable.
    #[inline]
    pub unsafe fn guard_intact(self, sz: usize) -> bool {
        let guard = self.payload().add(sz);
        MAGIC
            .iter()
            .enumerate()
            .all(|(i, &byte)| guard.add(i).read() == byte)
    }

    /// Populate the full allocated envelope: requested size, guard, call
    /// site, and self-address.
    ///
    /// # Safety
    /// `self` must be a valid allocated block sized for `sz` payload bytes
    /// plus the envelope.
    pub unsafe fn set_alloc_metadata(self, sz: usize, site: AllocSite) {
        self.set_requested_size(sz as u32);
        self.write_guard(sz);
        self.set_line(site.line());
        self.set_site(site);
        self.set_self_addr();
    }

    /// Check that this block's list neighbors point back at it. Constant
    /// time; a genuine list member always passes.
    ///
    /// # Safety
    /// `self` must be a valid block with initialized link slots, and its
    /// link targets (if any) must be valid blocks.
    pub unsafe fn list_links_consistent(self) -> bool {
        if let Some(next) = self.list_next() {
            if next.list_prev() != Some(self) {
                return false;
            }
        }
        if let Some(prev) = self.list_prev() {
            if prev.list_next() != Some(self) {
                return false;
            }
        }
        true
    }
}
