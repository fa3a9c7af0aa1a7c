//! The heap aggregate: one arena, the two explicit lists, and the
//! statistics. Every public operation is a method here or in one of the
//! submodules (`place`, `coalesce`, `validate`, `realloc`); nothing else
//! mutates block metadata.

mod coalesce;
mod place;
mod realloc;
mod validate;

pub use validate::FreeError;

use crate::arena::Arena;
use crate::block::Block;
use crate::list::BlockList;
use crate::site::AllocSite;
use crate::stats::Statistics;
use crate::util::{adjusted_size, ALIGNMENT, ALLOC_META};
use core::ptr;

pub struct Heap {
    arena: Arena,
    free_list: BlockList,
    alloc_list: BlockList,
    stats: Statistics,
}

impl Heap {
    /// Create a heap over a freshly mapped arena. The free list starts
    /// with the single block spanning the whole arena; the alloc list
    /// starts empty. Returns `None` if the arena mapping fails.
    pub fn new() -> Option<Heap> {
        let arena = Arena::new()?;
        let mut free_list = BlockList::new();
        unsafe { free_list.push_front(arena.first_block()) };
        Some(Heap {
            arena,
            free_list,
            alloc_list: BlockList::new(),
            stats: Statistics::new(),
        })
    }

    /// Allocate `sz` bytes, tagging the block with the caller's location.
    /// Returns null for `sz == 0`, on size overflow, and when no free
    /// block fits.
    #[track_caller]
    pub fn malloc(&mut self, sz: usize) -> *mut u8 {
        self.malloc_at(sz, AllocSite::caller())
    }

    /// As [`Heap::malloc`], with an explicit call site.
    pub fn malloc_at(&mut self, sz: usize, site: AllocSite) -> *mut u8 {
        if sz == 0 {
            return ptr::null_mut();
        }
        if sz > usize::MAX - (ALIGNMENT + ALLOC_META) {
            self.stats.record_fail(sz);
            return ptr::null_mut();
        }

        let asize = adjusted_size(sz);
        let block = match unsafe { self.find_fit(asize) } {
            Some(block) => block,
            None => {
                self.stats.record_fail(sz);
                return ptr::null_mut();
            }
        };

        unsafe {
            debug_assert!(!block.is_alloc());
            self.place(block, asize);
            debug_assert!(block.is_alloc());
            block.set_alloc_metadata(sz, site);
        }
        self.stats.record_malloc(block.payload(), sz);
        block.payload()
    }

    /// Allocate zeroed room for `count` elements of `sz` bytes each.
    /// Returns null for `count == 0` and on multiplication overflow.
    #[track_caller]
    pub fn calloc(&mut self, count: usize, sz: usize) -> *mut u8 {
        self.calloc_at(count, sz, AllocSite::caller())
    }

    /// As [`Heap::calloc`], with an explicit call site.
    pub fn calloc_at(&mut self, count: usize, sz: usize, site: AllocSite) -> *mut u8 {
        if count == 0 {
            return ptr::null_mut();
        }
        if sz > usize::MAX / count {
            self.stats.record_fail(sz);
            return ptr::null_mut();
        }
        let total = count * sz;
        let payload = self.malloc_at(total, site);
        if !payload.is_null() {
            unsafe { ptr::write_bytes(payload, 0, total) };
        }
        payload
    }

    /// Free the allocation at `ptr`. Null is a silent no-op; anything that
    /// fails validation prints a `MEMORY BUG` diagnostic to stderr and
    /// leaves the heap untouched.
    ///
    /// # Safety
    /// If `ptr` is a live allocation from this heap, the caller must not
    /// use it afterwards. (Invalid pointers are rejected by the validator
    /// and are safe to pass.)
    #[track_caller]
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        self.free_at(ptr, AllocSite::caller());
    }

    /// As [`Heap::free`], with an explicit call site.
    ///
    /// # Safety
    /// As for [`Heap::free`].
    pub unsafe fn free_at(&mut self, ptr: *mut u8, site: AllocSite) {
        if ptr.is_null() {
            return;
        }
        if self.validate_free(ptr, site).is_err() {
            return;
        }

        let block = Block::from_payload(ptr);
        debug_assert!(block.is_alloc());
        self.alloc_list.unlink(block);
        // Capture the requested size before coalescing destroys the
        // envelope; this is what gets credited back to active_size.
        let requested = block.requested_size() as usize;
        let merged = self.coalesce(block);
        debug_assert!(!merged.is_alloc());
        self.stats.record_free(requested);
    }

    /// Resize the allocation at `ptr` to `new_size` bytes, growing in
    /// place by absorbing free neighbors when possible and falling back to
    /// allocate-copy-free. Returns null (with the original allocation
    /// intact) if `new_size == 0`, on overflow, if `ptr` fails validation,
    /// or if the fallback allocation fails.
    ///
    /// # Safety
    /// If `ptr` is a live allocation from this heap and the call returns
    /// non-null, the caller must only use the returned pointer afterwards.
    #[track_caller]
    pub unsafe fn realloc(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        self.realloc_at(ptr, new_size, AllocSite::caller())
    }

    /// Current statistics snapshot.
    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Print the two-line statistics summary to stdout.
    pub fn print_statistics(&self) {
        self.stats.print();
    }

    /// Print one `LEAK CHECK` line per live allocation to stdout, most
    /// recently allocated first.
    pub fn print_leak_report(&self) {
        unsafe {
            for block in self.alloc_list.iter() {
                println!(
                    "LEAK CHECK: {}:{}: allocated object {:p} with size {}",
                    block.site().file(),
                    block.line(),
                    block.payload(),
                    block.requested_size()
                );
            }
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The free list. Exposed for tests and the self-check walk.
    pub fn free_list(&self) -> &BlockList {
        &self.free_list
    }

    /// The alloc list. Exposed for tests and the self-check walk.
    pub fn alloc_list(&self) -> &BlockList {
        &self.alloc_list
    }
}
