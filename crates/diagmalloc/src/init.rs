//! The process-global heap behind the free-function API.
//!
//! The heap is created lazily on first use. If the arena mapping fails the
//! façade stays disabled for the life of the process: allocations return
//! null and frees are no-ops. A futex mutex serializes all access so that
//! cross-thread misuse of the single-threaded contract degrades to slow
//! instead of racy.

use crate::heap::Heap;
use crate::sync::RawMutex;
use core::cell::UnsafeCell;

enum GlobalState {
    Uninit,
    Ready(Heap),
    Disabled,
}

struct GlobalHeap(UnsafeCell<GlobalState>);

// Access is serialized by LOCK; the heap itself is not Sync.
unsafe impl Sync for GlobalHeap {}

static LOCK: RawMutex = RawMutex::new();
static GLOBAL: GlobalHeap = GlobalHeap(UnsafeCell::new(GlobalState::Uninit));

/// Run `f` against the process-global heap under the lock, creating the
/// heap on first use. Returns `None` when the heap could not be created.
pub fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> Option<R> {
    LOCK.lock();
    let state = unsafe { &mut *GLOBAL.0.get() };
    if let GlobalState::Uninit = *state {
        *state = match Heap::new() {
            Some(heap) => GlobalState::Ready(heap),
            None => GlobalState::Disabled,
        };
    }
    let result = match state {
        GlobalState::Ready(heap) => Some(f(heap)),
        _ => None,
    };
    LOCK.unlock();
    result
}
