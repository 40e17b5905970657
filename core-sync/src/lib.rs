//! # Folder Synchronization
//!
//! Keeps the catalog consistent with folders on disk.
//!
//! ## Components
//!
//! - [`FolderSyncEngine`] - diff a folder against a catalog snapshot and apply
//!   the result
//! - [`FolderScanner`] - blocking-pool directory walk with hidden-entry and
//!   package pruning
//! - [`AccessTokenResolver`] - token resolution with RAII scope brackets,
//!   shared with the derivative cache

pub mod access;
pub mod engine;
pub mod error;
pub mod scanner;
pub mod summary;

pub use access::{AccessTokenResolver, ResolvedAccess, ScopedAccess};
pub use engine::{FolderSyncEngine, ImportMode, ProgressFn};
pub use error::{Result, SyncError};
pub use scanner::{FolderScanner, ScanOutcome};
pub use summary::{ItemErrorReason, SyncItemError, SyncSummary};
