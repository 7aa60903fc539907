//! Owner-tagged spinlock for state shared with the audio thread
//!
//! A `std::sync::Mutex` can park the real-time thread behind a control
//! thread that got descheduled. Every critical section guarded by this lock
//! is a handful of `Vec` operations on preallocated storage, so spinning is
//! bounded and short.
//!
//! The lock word holds the id of the thread role that owns it rather than a
//! plain flag. That turns two classes of bugs into immediate panics:
//!
//! - re-entrancy: a role trying to take a lock it already holds
//! - hand-off: a guard releasing a lock that another role owns

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;

/// Thread role taking the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOwner(u32);

impl LockOwner {
    /// Control thread (start/stop/play/reap)
    pub const CONTROL: LockOwner = LockOwner(1);
    /// Real-time audio callback
    pub const AUDIO: LockOwner = LockOwner(2);
    /// Background decode service
    pub const SERVICE: LockOwner = LockOwner(3);
}

pub struct SpinLock<T> {
    owner: AtomicU32,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is serialized by the owner word; a guard exists
// for at most one owner at a time.
unsafe impl<T: Send> Sync for SpinLock<T> {}
unsafe impl<T: Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            owner: AtomicU32::new(UNLOCKED),
            value: UnsafeCell::new(value),
        }
    }

    /// Spin until the lock is free, then take it for `owner`
    ///
    /// # Panics
    ///
    /// If `owner` already holds the lock.
    pub fn lock(&self, owner: LockOwner) -> SpinGuard<'_, T> {
        assert_ne!(
            self.owner.load(Ordering::Relaxed),
            owner.0,
            "spinlock re-entered by {:?}",
            owner
        );

        while self
            .owner
            .compare_exchange_weak(UNLOCKED, owner.0, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.owner.load(Ordering::Relaxed) != UNLOCKED {
                hint::spin_loop();
            }
        }

        SpinGuard { lock: self, owner }
    }
}

impl<T> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("owner", &self.owner.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Scoped ownership of a [`SpinLock`]
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
    owner: LockOwner,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive ownership of the lock
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        let previous = self.lock.owner.swap(UNLOCKED, Ordering::Release);
        assert_eq!(previous, self.owner.0, "inconsistent lock hand-off");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = SpinLock::new(1);
        {
            let mut guard = lock.lock(LockOwner::CONTROL);
            *guard += 1;
        }
        assert_eq!(*lock.lock(LockOwner::AUDIO), 2);
    }

    #[test]
    #[should_panic(expected = "re-entered")]
    fn test_reentry_panics() {
        let lock = SpinLock::new(());
        let _outer = lock.lock(LockOwner::SERVICE);
        let _inner = lock.lock(LockOwner::SERVICE);
    }

    #[test]
    fn test_mutual_exclusion_across_threads() {
        let lock = Arc::new(SpinLock::new(0u64));
        let owners = [LockOwner::CONTROL, LockOwner::AUDIO, LockOwner::SERVICE];

        let handles: Vec<_> = owners
            .into_iter()
            .map(|owner| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        *lock.lock(owner) += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*lock.lock(LockOwner::CONTROL), 30_000);
    }
}
