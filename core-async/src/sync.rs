//! Synchronization primitives.
//!
//! Async-aware locks, semaphores and channels come from tokio; cooperative
//! cancellation uses [`CancellationToken`] from tokio-util.
//!
//! Use these types instead of `std::sync` when a guard is held across an
//! `.await`. Short, non-suspending critical sections may keep using
//! `std::sync::Mutex`.

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Mutex, MutexGuard, Notify,
    OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};
pub use tokio_util::sync::CancellationToken;

/// Locks a `std::sync::Mutex`, recovering the data if a previous holder
/// panicked.
///
/// Used for bookkeeping maps whose contents stay consistent even when a
/// holder unwinds.
pub fn lock_unpoisoned<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
