//! # Folder Sync Engine
//!
//! Reconciles one on-disk folder against the catalog.
//!
//! ## Workflow
//!
//! 1. Canonicalize the folder and select the records strictly under it
//! 2. Resolve the longest-prefix bookmark token and open its scope,
//!    persisting a refreshed token when the old one went stale
//! 3. Walk the folder on the blocking pool
//! 4. Fail with `PermissionDenied` / `NotADirectory` before touching the
//!    catalog; a missing folder is reported, not raised
//! 5. Delete records gone from disk, insert new files in case-insensitive
//!    order, collecting per-file failures into the summary
//! 6. Refresh the folder bookmark, or drop every bookmark under a missing
//!    folder
//!
//! Progress is reported as 0.0 at start, 0.1 once the scan is done, then the
//! remaining 0.9 spread evenly over the applied changes, ending at exactly
//! 1.0. Reported values never decrease.

use bridge_traits::time::Clock;
use core_library::{
    catalog::Catalog,
    error::LibraryError,
    media_kind::MediaClassifier,
    models::{FolderBookmark, MediaRecord},
    path::{canonicalize, is_same_or_under, is_under},
};
use core_runtime::config::CoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::access::{AccessTokenResolver, ScopedAccess};
use crate::error::{Result, SyncError};
use crate::scanner::{FolderScanner, ScanOutcome};
use crate::summary::{ItemErrorReason, SyncItemError, SyncSummary};

/// Progress callback, called with values in `0.0..=1.0`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// How explicitly imported files are reached later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Files stay where they are; each record carries its own access token
    Reference,
    /// Files are reachable without tokens
    Direct,
}

struct Progress<'a> {
    callback: Option<ProgressFn<'a>>,
    last: f64,
    step: f64,
    done: usize,
}

impl<'a> Progress<'a> {
    const SCAN_SHARE: f64 = 0.1;

    fn new(callback: Option<ProgressFn<'a>>) -> Self {
        Self {
            callback,
            last: 0.0,
            step: 0.0,
            done: 0,
        }
    }

    fn report(&mut self, value: f64) {
        let value = value.clamp(self.last, 1.0);
        self.last = value;
        if let Some(callback) = self.callback {
            callback(value);
        }
    }

    fn scanned(&mut self, total_items: usize) {
        self.step = (1.0 - Self::SCAN_SHARE) / total_items.max(1) as f64;
        self.report(Self::SCAN_SHARE);
    }

    fn advance(&mut self) {
        self.done += 1;
        self.report(Self::SCAN_SHARE + self.step * self.done as f64);
    }

    fn finish(&mut self) {
        self.last = 1.0;
        if let Some(callback) = self.callback {
            callback(1.0);
        }
    }
}

pub struct FolderSyncEngine {
    catalog: Arc<dyn Catalog>,
    resolver: AccessTokenResolver,
    scanner: FolderScanner,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for FolderSyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderSyncEngine")
            .field("scanner", &self.scanner)
            .finish_non_exhaustive()
    }
}

impl FolderSyncEngine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        resolver: AccessTokenResolver,
        scanner: FolderScanner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            scanner,
            clock,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        let classifier = MediaClassifier::new(Arc::clone(&config.content_types));
        Self::new(
            Arc::clone(&config.catalog),
            AccessTokenResolver::new(Arc::clone(&config.scope_provider)),
            FolderScanner::new(config.sync.clone(), classifier),
            Arc::clone(&config.clock),
        )
    }

    /// Synchronizes `folder` against a catalog snapshot.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` when the folder cannot be read
    /// - `NotADirectory` when the path is a file
    ///
    /// Both are raised before any mutation. Per-file failures are collected
    /// into [`SyncSummary::errors`] instead.
    #[instrument(skip_all, fields(folder = %folder.display()))]
    pub async fn sync(
        &self,
        folder: &Path,
        records: &[MediaRecord],
        bookmarks: &[FolderBookmark],
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        let folder = canonicalize(folder);
        let mut progress = Progress::new(on_progress);

        let existing: HashMap<PathBuf, &MediaRecord> = records
            .iter()
            .filter(|record| is_under(&record.path, &folder))
            .map(|record| (canonicalize(&record.path), record))
            .collect();
        let needs_tokens = existing
            .values()
            .any(|record| record.access_token.is_some());

        let folder_scope = self.open_bookmark_scope(&folder, bookmarks).await;
        progress.report(0.0);

        let disk = match self.scanner.scan(&folder).await? {
            ScanOutcome::PermissionDenied => return Err(SyncError::PermissionDenied(folder)),
            ScanOutcome::NotADirectory => return Err(SyncError::NotADirectory(folder)),
            ScanOutcome::Missing => None,
            ScanOutcome::Scanned(paths) => Some(paths),
        };
        let folder_missing = disk.is_none();
        let disk = disk.unwrap_or_default();

        let mut removed: Vec<&MediaRecord> = existing
            .iter()
            .filter(|(path, _)| !disk.contains(*path))
            .map(|(_, record)| *record)
            .collect();
        removed.sort_by(|a, b| a.path.cmp(&b.path));
        let mut added: Vec<PathBuf> = disk
            .into_iter()
            .filter(|path| !existing.contains_key(path))
            .collect();
        added.sort_by_cached_key(|path| path.to_string_lossy().to_lowercase());

        debug!(
            existing = existing.len(),
            removed = removed.len(),
            added = added.len(),
            folder_missing,
            "Computed folder diff"
        );
        progress.scanned(removed.len() + added.len());

        let mut summary = SyncSummary::new(folder.clone());
        summary.folder_missing = folder_missing;

        if !folder_missing && (needs_tokens || folder_scope.is_some()) {
            self.refresh_folder_bookmark(&folder).await;
        }

        for record in removed {
            match self.catalog.delete_record(record.id).await {
                Ok(true) => {
                    summary.removed_count += 1;
                    summary.removed_paths.push(record.path.clone());
                }
                Ok(false) => debug!(id = %record.id, "Record already gone"),
                Err(err) => {
                    self.push_error(
                        &mut summary,
                        record.path.clone(),
                        ItemErrorReason::Catalog(err.to_string()),
                    );
                }
            }
            progress.advance();
        }

        for path in added {
            match self.add_record(&path, needs_tokens).await {
                Ok(()) => summary.added_count += 1,
                Err(reason) => self.push_error(&mut summary, path, reason),
            }
            progress.advance();
        }

        if folder_missing {
            self.drop_bookmarks_under(&folder).await?;
        }
        drop(folder_scope);
        progress.finish();

        info!(
            added = summary.added_count,
            removed = summary.removed_count,
            errors = summary.errors.len(),
            folder_missing = summary.folder_missing,
            "Folder sync completed"
        );
        Ok(summary)
    }

    /// Inserts records for explicitly chosen files and folders.
    ///
    /// Folders are expanded with the same walk rules as [`sync`](Self::sync).
    /// Paths already in the catalog are reported as duplicates. In
    /// [`ImportMode::Reference`] every new record gets its own token and a
    /// mint failure skips the file.
    #[instrument(skip_all, fields(count = paths.len(), ?mode))]
    pub async fn import_paths(
        &self,
        paths: &[PathBuf],
        mode: ImportMode,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        let mut progress = Progress::new(on_progress);
        progress.report(0.0);
        let mut summary = SyncSummary::default();

        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        for path in paths {
            let path = canonicalize(path);
            match self.expand(&path).await? {
                Ok(files) => {
                    for file in files {
                        if seen.insert(file.clone()) {
                            candidates.push(file);
                        }
                    }
                }
                Err(reason) => self.push_error(&mut summary, path, reason),
            }
        }

        let known: HashSet<PathBuf> = self
            .catalog
            .fetch_records()
            .await?
            .into_iter()
            .map(|record| record.path)
            .collect();
        progress.scanned(candidates.len());

        let with_token = mode == ImportMode::Reference;
        for path in candidates {
            let outcome = if known.contains(&path) {
                Err(ItemErrorReason::Duplicate)
            } else {
                self.add_record(&path, with_token).await
            };
            match outcome {
                Ok(()) => summary.added_count += 1,
                Err(reason) => self.push_error(&mut summary, path, reason),
            }
            progress.advance();
        }
        progress.finish();

        info!(
            added = summary.added_count,
            errors = summary.errors.len(),
            "Import completed"
        );
        Ok(summary)
    }

    /// Media files reachable from one import path, sorted case-insensitively.
    async fn expand(
        &self,
        path: &Path,
    ) -> Result<std::result::Result<Vec<PathBuf>, ItemErrorReason>> {
        let is_dir = match core_async::fs::metadata(path).await {
            Ok(metadata) => metadata.is_dir(),
            Err(_) => return Ok(Err(ItemErrorReason::NotFound)),
        };
        if is_dir {
            let mut files: Vec<PathBuf> = match self.scanner.scan(path).await? {
                ScanOutcome::Scanned(files) => files.into_iter().collect(),
                ScanOutcome::Missing => return Ok(Err(ItemErrorReason::NotFound)),
                ScanOutcome::PermissionDenied | ScanOutcome::NotADirectory => {
                    return Ok(Err(ItemErrorReason::Unreadable))
                }
            };
            files.sort_by_cached_key(|file| file.to_string_lossy().to_lowercase());
            return Ok(Ok(files));
        }
        if !self.scanner.classifier().is_media(path) {
            return Ok(Err(ItemErrorReason::Unsupported));
        }
        Ok(Ok(vec![path.to_path_buf()]))
    }

    async fn add_record(
        &self,
        path: &Path,
        with_token: bool,
    ) -> std::result::Result<(), ItemErrorReason> {
        let token = if with_token {
            let token = self
                .resolver
                .mint(path)
                .await
                .map_err(|err| ItemErrorReason::TokenMint(err.to_string()))?;
            Some(token)
        } else {
            None
        };

        let record = MediaRecord::new(path, token, self.clock.now());
        self.catalog
            .insert_record(record)
            .await
            .map_err(|err| match err {
                LibraryError::DuplicatePath(_) => ItemErrorReason::Duplicate,
                other => ItemErrorReason::Catalog(other.to_string()),
            })
    }

    /// Opens the scope of the bookmark covering `folder`, persisting a
    /// refreshed token when the stored one is stale.
    async fn open_bookmark_scope(
        &self,
        folder: &Path,
        bookmarks: &[FolderBookmark],
    ) -> Option<ScopedAccess> {
        let bookmark = FolderBookmark::best_match(bookmarks, folder)?;
        let token = bookmark.access_token.as_ref()?;

        match self.resolver.resolve(token).await {
            Ok(access) => {
                if let Some(fresh) = access.refreshed {
                    let mut updated = bookmark.clone();
                    updated.access_token = Some(fresh);
                    if let Err(err) = self.catalog.upsert_bookmark(updated).await {
                        warn!(error = %err, "Failed to persist refreshed bookmark");
                    }
                }
                Some(access.scope)
            }
            Err(err) => {
                warn!(
                    bookmark = %bookmark.path.display(),
                    error = %err,
                    "Bookmark token did not resolve"
                );
                None
            }
        }
    }

    async fn refresh_folder_bookmark(&self, folder: &Path) {
        match self.resolver.mint(folder).await {
            Ok(token) => {
                let bookmark = FolderBookmark::new(folder, Some(token), self.clock.now());
                if let Err(err) = self.catalog.upsert_bookmark(bookmark).await {
                    warn!(error = %err, "Failed to upsert folder bookmark");
                }
            }
            Err(err) => warn!(error = %err, "Could not mint folder bookmark"),
        }
    }

    async fn drop_bookmarks_under(&self, folder: &Path) -> Result<()> {
        for bookmark in self.catalog.fetch_bookmarks().await? {
            if is_same_or_under(&bookmark.path, folder) {
                self.catalog.delete_bookmark(bookmark.id).await?;
                debug!(bookmark = %bookmark.path.display(), "Dropped bookmark of missing folder");
            }
        }
        Ok(())
    }

    fn push_error(&self, summary: &mut SyncSummary, path: PathBuf, reason: ItemErrorReason) {
        let error = SyncItemError::new(path, reason);
        warn!(file = %error.file_name, reason = %error.reason, "Skipped item");
        summary.errors.push(error);
    }
}
