//! Sync results and per-item failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Why a single file was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ItemErrorReason {
    /// No access token could be minted for the file
    TokenMint(String),
    /// A record already exists for the path
    Duplicate,
    /// The catalog rejected the mutation
    Catalog(String),
    /// The path is not a supported image or video
    Unsupported,
    /// Nothing exists at the path
    NotFound,
    /// A folder could not be read
    Unreadable,
}

impl fmt::Display for ItemErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemErrorReason::TokenMint(detail) => {
                write!(f, "could not create access token: {detail}")
            }
            ItemErrorReason::Duplicate => f.write_str("already in the catalog"),
            ItemErrorReason::Catalog(detail) => write!(f, "catalog error: {detail}"),
            ItemErrorReason::Unsupported => f.write_str("not a supported media file"),
            ItemErrorReason::NotFound => f.write_str("file not found"),
            ItemErrorReason::Unreadable => f.write_str("folder cannot be read"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
    pub path: PathBuf,
    pub file_name: String,
    pub reason: ItemErrorReason,
}

impl SyncItemError {
    pub fn new(path: PathBuf, reason: ItemErrorReason) -> Self {
        let file_name = core_library::path::file_name(&path);
        Self {
            path,
            file_name,
            reason,
        }
    }
}

impl fmt::Display for SyncItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Canonical folder that was synchronized
    pub folder_path: PathBuf,
    pub added_count: usize,
    pub removed_count: usize,
    /// The folder no longer exists; its records and bookmarks were dropped
    pub folder_missing: bool,
    /// Paths whose records were removed, for derivative invalidation
    pub removed_paths: Vec<PathBuf>,
    pub errors: Vec<SyncItemError>,
}

impl SyncSummary {
    pub fn new(folder_path: PathBuf) -> Self {
        Self {
            folder_path,
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added_count + self.removed_count
    }
}
