//! Validator: classify the argument of a free (or realloc) before any
//! metadata is touched. Every rejection prints a fixed-format `MEMORY BUG`
//! line to stderr and leaves the heap untouched.

use super::Heap;
use crate::block::{Block, MAGIC};
use crate::site::AllocSite;
use crate::util::{is_aligned, ALIGNMENT, MIN_BLOCK};

/// Why a free request was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FreeError {
    /// The pointer lies outside every payload ever handed out.
    NotInHeap,
    /// The pointer is inside the heap but is not a live allocation:
    /// misaligned, interior, or fabricated.
    NotAllocated,
    /// The pointer names a block that is already free.
    DoubleFree,
    /// The block looks allocated but its trailing guard was overwritten.
    WildWrite,
}

impl Heap {
    /// Classify `ptr` as a free argument. `Ok(())` means `ptr` is a live
    /// allocation owned by this heap; any `Err` has already been reported
    /// on stderr, attributed to `site`.
    ///
    /// All probes derived from unverified header words are bounds-checked
    /// against the arena first, so stray and interior pointers are
    /// diagnosed rather than chased.
    ///
    /// # Safety
    /// The heap's lists must be well formed. If `ptr` points into a live
    /// payload whose bytes have been crafted to mimic a block envelope,
    /// the forged link words may be followed.
    pub unsafe fn validate_free(&self, ptr: *mut u8, site: AllocSite) -> Result<(), FreeError> {
        let addr = ptr as usize;

        if addr < self.stats.heap_min || addr > self.stats.heap_max {
            eprintln!(
                "MEMORY BUG: {}:{}: invalid free of pointer {:p}, not in heap",
                site.file(),
                site.line(),
                ptr
            );
            return Err(FreeError::NotInHeap);
        }

        // We never hand out misaligned payloads.
        if !is_aligned(addr, ALIGNMENT) {
            eprintln!(
                "MEMORY BUG: {}:{}: invalid free of pointer {:p}, not allocated",
                site.file(),
                site.line(),
                ptr
            );
            return Err(FreeError::NotAllocated);
        }

        let block = Block::from_payload(ptr);

        if !block.is_alloc() {
            if self.plausible_free_block(block) {
                eprintln!(
                    "MEMORY BUG: {}:{}: invalid free of pointer {:p}, double free",
                    site.file(),
                    site.line(),
                    ptr
                );
                return Err(FreeError::DoubleFree);
            }

            eprintln!(
                "MEMORY BUG: {}:{}: invalid free of pointer {:p}, not allocated",
                site.file(),
                site.line(),
                ptr
            );
            if let Some(container) = self.find_containing(ptr) {
                let offset = addr - container.payload() as usize;
                eprintln!(
                    "\t{}:{}: {:p} is {} bytes inside a {} byte region allocated here",
                    container.site().file(),
                    container.line(),
                    ptr,
                    offset,
                    container.requested_size()
                );
            }
            return Err(FreeError::NotAllocated);
        }

        // The word looks like an allocated header. A real allocated block
        // has a sane size; anything else cannot carry the envelope, so
        // stop before dereferencing through it.
        let size = block.size();
        if size < MIN_BLOCK || !is_aligned(size, ALIGNMENT) || !self.arena.contains_range(block.addr(), size)
        {
            eprintln!(
                "MEMORY BUG: {}:{}: invalid free of pointer {:p}, not allocated",
                site.file(),
                site.line(),
                ptr
            );
            return Err(FreeError::NotAllocated);
        }

        let requested = block.requested_size() as usize;
        let guard_ok = self.arena.contains_range(addr, requested + MAGIC.len())
            && block.guard_intact(requested);
        if !guard_ok {
            eprintln!(
                "MEMORY BUG: {}:{}: detected wild write during free of pointer {:p}",
                site.file(),
                site.line(),
                ptr
            );
            return Err(FreeError::WildWrite);
        }

        // The block must be where it thinks it is, and its alloc-list
        // neighbors must agree it is a member.
        if block.self_addr() != block.header() || !block.list_links_consistent() {
            eprintln!(
                "MEMORY BUG: {}:{}: invalid free of pointer {:p}, not allocated",
                site.file(),
                site.line(),
                ptr
            );
            return Err(FreeError::NotAllocated);
        }

        Ok(())
    }

    /// Whether `block` is a believable member of the free-block
    /// population: nonzero in-bounds size, footer mirroring the header,
    /// both marked free. Garbage words fail somewhere along the chain.
    ///
    /// # Safety
    /// `block`'s header word must be readable.
    unsafe fn plausible_free_block(&self, block: Block) -> bool {
        let size = block.size();
        if size == 0 || !is_aligned(size, ALIGNMENT) || !self.arena.contains_range(block.addr(), size)
        {
            return false;
        }
        let footer = block.footer();
        *footer == *block.header() && Block::from_footer(footer) == block
    }

    /// The live allocation strictly containing `ptr`, if any. Walks the
    /// alloc list; this cost is only paid on an already-failing free.
    /// Interior pointers into *free* blocks are not searched for.
    ///
    /// # Safety
    /// The alloc list must be well formed.
    unsafe fn find_containing(&self, ptr: *mut u8) -> Option<Block> {
        let addr = ptr as usize;
        self.alloc_list.iter().find(|block| {
            let payload = block.payload() as usize;
            addr > payload && addr < payload + block.requested_size() as usize
        })
    }
}
