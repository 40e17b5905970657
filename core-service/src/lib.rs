//! Core service façade.
//!
//! [`CoreService`] is built once at startup from a [`CoreConfig`] and owns one
//! instance of every service: the catalog handle, the folder sync engine, the
//! derivative cache and the metadata enricher. Hosts hold the service (it is
//! cheap to clone) instead of reaching for globals.
//!
//! Desktop apps typically enable the `desktop-shims` feature, which lets
//! [`CoreConfig::builder`] fall back to the `bridge-desktop` implementations
//! for every capability the host does not provide:
//!
//! ```ignore
//! let core = core_service::bootstrap_desktop()?;
//! let summary = core.sync_folder(Path::new("/Volumes/Card/DCIM"), None).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_derivatives::{CacheMetrics, DerivativeImage, LoadError, DEFAULT_DISPLAY_MAX_SIZE};
pub use core_library::{FolderNode, MediaRecord, SortOption};
pub use core_metadata::EnrichmentReport;
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_sync::{ImportMode, ProgressFn, SyncSummary};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_derivatives::DerivativeCache;
use core_library::catalog::Catalog;
use core_library::models::{FolderBookmark, MediaId};
use core_library::sort::sort_records;
use core_metadata::MetadataEnricher;
use core_sync::FolderSyncEngine;
use tracing::{debug, info};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    catalog: Arc<dyn Catalog>,
    sync: Arc<FolderSyncEngine>,
    derivatives: DerivativeCache,
    enricher: Arc<MetadataEnricher>,
}

impl fmt::Debug for CoreService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreService")
            .field("sync", &self.sync)
            .field("derivatives", &self.derivatives)
            .finish_non_exhaustive()
    }
}

impl CoreService {
    /// Builds every service from a validated configuration.
    pub fn new(config: CoreConfig) -> Self {
        info!(cache = ?config.cache, "Initializing core services");
        Self {
            catalog: Arc::clone(&config.catalog),
            sync: Arc::new(FolderSyncEngine::from_config(&config)),
            derivatives: DerivativeCache::from_config(&config),
            enricher: Arc::new(MetadataEnricher::from_config(&config)),
        }
    }

    pub fn catalog(&self) -> Arc<dyn Catalog> {
        Arc::clone(&self.catalog)
    }

    // ------------------------------------------------------------------
    // Synchronization
    // ------------------------------------------------------------------

    /// Reconciles `folder` against the given snapshot. Derivatives of
    /// removed records are evicted.
    pub async fn sync(
        &self,
        folder: &Path,
        records: &[MediaRecord],
        bookmarks: &[FolderBookmark],
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        let summary = self.sync.sync(folder, records, bookmarks, on_progress).await?;
        self.evict_removed(&summary);
        Ok(summary)
    }

    /// Snapshots the owned catalog and syncs `folder` against it.
    pub async fn sync_folder(
        &self,
        folder: &Path,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        let records = self.catalog.fetch_records().await?;
        let bookmarks = self.catalog.fetch_bookmarks().await?;
        self.sync(folder, &records, &bookmarks, on_progress).await
    }

    pub async fn import_paths(
        &self,
        paths: &[PathBuf],
        mode: ImportMode,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<SyncSummary> {
        Ok(self.sync.import_paths(paths, mode, on_progress).await?)
    }

    fn evict_removed(&self, summary: &SyncSummary) {
        let evicted: usize = summary
            .removed_paths
            .iter()
            .map(|path| self.derivatives.invalidate_path(path))
            .sum();
        if evicted > 0 {
            debug!(evicted, "Evicted derivatives of removed records");
        }
    }

    // ------------------------------------------------------------------
    // Derivatives
    // ------------------------------------------------------------------

    pub async fn get_thumbnail(
        &self,
        record: &MediaRecord,
        size: u32,
    ) -> core_derivatives::Result<DerivativeImage> {
        self.derivatives.get_thumbnail(record, size).await
    }

    /// `max_size` defaults to [`DEFAULT_DISPLAY_MAX_SIZE`].
    pub async fn get_display_image(
        &self,
        record: &MediaRecord,
        max_size: Option<u32>,
    ) -> core_derivatives::Result<DerivativeImage> {
        self.derivatives
            .get_display_image(record, max_size.unwrap_or(DEFAULT_DISPLAY_MAX_SIZE))
            .await
    }

    pub fn peek_cached(&self, record: &MediaRecord, size: u32) -> Option<DerivativeImage> {
        self.derivatives.peek_cached(record, size)
    }

    /// Warms thumbnails for records next to the one on screen.
    pub async fn preload(&self, records: &[MediaRecord], size: u32) -> usize {
        self.derivatives.preload(records, size).await
    }

    pub fn clear_cache(&self) {
        self.derivatives.clear_cache();
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.derivatives.metrics()
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    pub async fn enrich(&self, ids: &[MediaId]) -> Result<EnrichmentReport> {
        Ok(self.enricher.enrich(ids).await?)
    }

    /// Every record, ordered by `sort`.
    pub async fn records(&self, sort: SortOption) -> Result<Vec<MediaRecord>> {
        let mut records = self.catalog.fetch_records().await?;
        sort_records(&mut records, sort);
        Ok(records)
    }

    /// Folder forest of the records in the catalog.
    pub async fn folder_tree(&self) -> Result<Vec<FolderNode>> {
        let records = self.catalog.fetch_records().await?;
        Ok(FolderNode::build_tree(&records))
    }
}

/// Builds a [`CoreService`] on the desktop implementations and an in-memory
/// catalog.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop() -> Result<CoreService> {
    let config = CoreConfig::builder().build()?;
    Ok(CoreService::new(config))
}
