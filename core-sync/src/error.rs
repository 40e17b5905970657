use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use std::path::PathBuf;
use thiserror::Error;

/// Sync-phase failures. Both are raised before any catalog mutation.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Permission denied for folder {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Catalog error: {0}")]
    Library(#[from] LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Scan task failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
