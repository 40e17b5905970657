//! Async runtime layer for the culler core.
//!
//! Every `core-*` crate depends on this crate instead of reaching for tokio
//! directly. Besides the thin runtime re-exports it hosts the
//! [`coordinator::TaskCoordinator`], the single choke point for expensive
//! decode work.
//!
//! # Modules
//!
//! - `task`: Task spawning and blocking-pool offload
//! - `fs`: Async filesystem probes
//! - `time`: Time-related operations (sleep, duration, instant)
//! - `sync`: Synchronization primitives and cancellation tokens
//! - `coordinator`: Bounded, key-deduplicating job runner
//!
//! # Examples
//!
//! ```rust
//! use core_async::coordinator::TaskCoordinator;
//!
//! # async fn example() {
//! let coordinator: TaskCoordinator<String, u32> = TaskCoordinator::new(4);
//! let value = coordinator
//!     .run("answer".to_string(), |_token| async { 42 })
//!     .await
//!     .unwrap();
//! assert_eq!(value, 42);
//! # }
//! ```

pub mod coordinator;
pub mod fs;
pub mod sync;
pub mod task;
pub mod time;

pub use coordinator::{CoordinatorStats, JobError, TaskCoordinator};
pub use task::{spawn, spawn_blocking};
pub use time::{sleep, Duration, Instant};
