//! Task spawning and blocking-pool offload.
//!
//! Directory walks and image decodes are CPU or syscall heavy; they run on
//! tokio's blocking pool through [`run_blocking`] so the caller's task only
//! suspends.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! # async fn example() {
//! let handle = task::spawn(async { 42 });
//! assert_eq!(handle.await.unwrap(), 42);
//!
//! let sum = task::run_blocking(|| (1..=4).sum::<u32>()).await.unwrap();
//! assert_eq!(sum, 10);
//! # }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the Tokio runtime.
///
/// The spawned task may run on a different worker thread.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Runs a blocking closure on the blocking pool and awaits its result.
///
/// A panic inside the closure surfaces as a [`JoinError`] instead of
/// unwinding into the caller.
pub async fn run_blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(f).await
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
