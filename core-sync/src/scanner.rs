//! Directory walk producing the set of media paths on disk.

use core_library::media_kind::MediaClassifier;
use core_library::path::canonicalize;
use core_runtime::config::SyncConfig;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, SyncError};

/// What the walk found at the target folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The folder does not exist
    Missing,
    NotADirectory,
    PermissionDenied,
    /// Canonical paths of every media file under the folder
    Scanned(HashSet<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct FolderScanner {
    config: SyncConfig,
    classifier: MediaClassifier,
}

impl FolderScanner {
    pub fn new(config: SyncConfig, classifier: MediaClassifier) -> Self {
        let classifier = classifier.with_extra_extensions(
            config.extra_image_extensions.iter(),
            config.extra_video_extensions.iter(),
        );
        Self { config, classifier }
    }

    pub fn classifier(&self) -> &MediaClassifier {
        &self.classifier
    }

    /// Walks `folder` on the blocking pool.
    pub async fn scan(&self, folder: &Path) -> Result<ScanOutcome> {
        let scanner = self.clone();
        let folder = folder.to_path_buf();
        core_async::task::run_blocking(move || scanner.scan_blocking(&folder))
            .await
            .map_err(|e| SyncError::Internal(e.to_string()))
    }

    pub fn scan_blocking(&self, folder: &Path) -> ScanOutcome {
        let metadata = match std::fs::metadata(folder) {
            Ok(metadata) => metadata,
            Err(err) => return unreadable_root(&err),
        };
        if !metadata.is_dir() {
            return ScanOutcome::NotADirectory;
        }
        if std::fs::read_dir(folder).is_err() {
            return ScanOutcome::PermissionDenied;
        }

        let mut paths = HashSet::new();
        let mut skipped_errors = 0usize;
        let walker = WalkDir::new(folder)
            .follow_links(self.config.follow_symlinks)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    skipped_errors += 1;
                    debug!(error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.classifier.is_media(entry.path()) {
                paths.insert(canonicalize(entry.path()));
            }
        }

        debug!(
            folder = %folder.display(),
            media_files = paths.len(),
            skipped_errors,
            "Folder scan finished"
        );
        ScanOutcome::Scanned(paths)
    }

    /// Hidden entries and package directories are pruned with everything
    /// below them. The walk root is never pruned.
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if self.config.skip_hidden && name.starts_with('.') {
            return true;
        }
        entry.file_type().is_dir()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| self.config.is_package_extension(ext))
                .unwrap_or(false)
    }
}

/// Outcome for a folder whose metadata cannot be read.
fn unreadable_root(err: &io::Error) -> ScanOutcome {
    match err.kind() {
        io::ErrorKind::NotFound => ScanOutcome::Missing,
        _ => ScanOutcome::PermissionDenied,
    }
}
