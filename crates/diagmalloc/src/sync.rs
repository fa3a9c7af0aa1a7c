use core::sync::atomic::{AtomicU32, Ordering};

/// A small mutex built directly on futex on Linux, with a spin fallback
/// elsewhere. The allocator contract is single-threaded; this lock only
/// serializes cross-thread misuse of the process-global heap so it degrades
/// to "slow" instead of "racy".
pub struct RawMutex {
    /// 0 = unlocked, 1 = locked, 2 = locked with waiters
    state: AtomicU32,
}

impl RawMutex {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn lock(&self) {
        if self
            .state
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return;
        }
        self.lock_slow();
    }

    #[cold]
    fn lock_slow(&self) {
        loop {
            let old = self.state.swap(2, Ordering::Acquire);
            if old == 0 {
                return;
            }
            futex_wait(&self.state, 2);
        }
    }

    #[inline]
    pub fn unlock(&self) {
        if self.state.swap(0, Ordering::Release) == 2 {
            futex_wake(&self.state);
        }
    }
}

#[cfg(target_os = "linux")]
fn futex_wait(state: &AtomicU32, expected: u32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            state as *const AtomicU32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            core::ptr::null::<libc::timespec>(),
        );
    }
}

#[cfg(target_os = "linux")]
fn futex_wake(state: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            state as *const AtomicU32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1,
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wait(state: &AtomicU32, expected: u32) {
    if state.load(Ordering::Relaxed) == expected {
        core::hint::spin_loop();
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wake(_state: &AtomicU32) {}
