//! # Core Configuration Module
//!
//! Provides configuration management for the culler core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings. It enforces
//! fail-fast validation so every required bridge is present before any
//! service is constructed.
//!
//! ## Required Dependencies
//!
//! - `SecurityScopeProvider` - capability token mint/resolve
//! - `MediaDecoder` - image decode and video frame extraction
//! - `ContentTypeOracle` - classification of unknown extensions
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - defaults to the system clock
//! - `Catalog` - defaults to an empty in-memory catalog
//!
//! When the `desktop-shims` feature is enabled, the desktop implementations
//! from `bridge-desktop` are injected for any required bridge not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CacheConfig, CoreConfig};
//!
//! let config = CoreConfig::builder()
//!     .cache(CacheConfig::default().with_max_concurrent_jobs(2))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    access::SecurityScopeProvider,
    content_type::ContentTypeOracle,
    media::MediaDecoder,
    time::{Clock, SystemClock},
};
use core_library::catalog::{Catalog, MemoryCatalog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Folder scanning options used by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Skip entries whose name starts with `.`
    pub skip_hidden: bool,
    /// Directory extensions treated as opaque packages and never descended
    pub package_extensions: Vec<String>,
    pub follow_symlinks: bool,
    /// Image extensions accepted on top of the built-in table
    pub extra_image_extensions: Vec<String>,
    /// Video extensions accepted on top of the built-in table
    pub extra_video_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            package_extensions: [
                "app",
                "bundle",
                "framework",
                "plugin",
                "photoslibrary",
                "aplibrary",
                "fcpbundle",
                "imovielibrary",
                "lrdata",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            follow_symlinks: false,
            extra_image_extensions: Vec::new(),
            extra_video_extensions: Vec::new(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_package_extension(mut self, ext: impl Into<String>) -> Self {
        self.package_extensions.push(ext.into());
        self
    }

    pub fn with_extra_image_extension(mut self, ext: impl Into<String>) -> Self {
        self.extra_image_extensions.push(ext.into());
        self
    }

    pub fn with_extra_video_extension(mut self, ext: impl Into<String>) -> Self {
        self.extra_video_extensions.push(ext.into());
        self
    }

    /// True when a directory with this extension must not be descended.
    pub fn is_package_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.package_extensions
            .iter()
            .any(|pkg| pkg.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    pub fn validate(&self) -> Result<()> {
        let all = self
            .package_extensions
            .iter()
            .chain(&self.extra_image_extensions)
            .chain(&self.extra_video_extensions);
        for ext in all {
            let trimmed = ext.trim_start_matches('.');
            if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
                return Err(Error::Config(format!("Invalid extension: {ext:?}")));
            }
        }
        Ok(())
    }
}

/// Bounds for the two derivative tiers and the generation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub thumbnail_max_entries: usize,
    pub thumbnail_max_bytes: u64,
    pub display_max_entries: usize,
    pub display_max_bytes: u64,
    /// Generation jobs allowed to run at once
    pub max_concurrent_jobs: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_entries: 1000,
            thumbnail_max_bytes: 100 * 1024 * 1024, // 100 MiB
            display_max_entries: 500,
            display_max_bytes: 256 * 1024 * 1024, // 256 MiB
            max_concurrent_jobs: 4,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thumbnail_limits(mut self, max_entries: usize, max_bytes: u64) -> Self {
        self.thumbnail_max_entries = max_entries;
        self.thumbnail_max_bytes = max_bytes;
        self
    }

    pub fn with_display_limits(mut self, max_entries: usize, max_bytes: u64) -> Self {
        self.display_max_entries = max_entries;
        self.display_max_bytes = max_bytes;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.thumbnail_max_entries == 0 || self.display_max_entries == 0 {
            return Err(Error::Config(
                "Tier entry limits must be greater than 0".to_string(),
            ));
        }
        if self.thumbnail_max_bytes == 0 || self.display_max_bytes == 0 {
            return Err(Error::Config(
                "Tier byte limits must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(Error::Config(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Core configuration for the culler core.
///
/// Holds every bridge and setting needed to build the services. Use
/// [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub scope_provider: Arc<dyn SecurityScopeProvider>,
    pub decoder: Arc<dyn MediaDecoder>,
    pub content_types: Arc<dyn ContentTypeOracle>,
    pub clock: Arc<dyn Clock>,
    pub catalog: Arc<dyn Catalog>,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("scope_provider", &"SecurityScopeProvider { ... }")
            .field("decoder", &"MediaDecoder { ... }")
            .field("content_types", &"ContentTypeOracle { ... }")
            .field("clock", &"Clock { ... }")
            .field("catalog", &"Catalog { ... }")
            .field("sync", &self.sync)
            .field("cache", &self.cache)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.sync.validate()?;
        self.cache.validate()
    }
}

#[cfg(feature = "desktop-shims")]
mod defaults {
    use super::*;
    use bridge_desktop::{ImageCrateDecoder, MimeGuessOracle, PathScopeProvider};

    pub fn scope_provider() -> Result<Arc<dyn SecurityScopeProvider>> {
        Ok(Arc::new(PathScopeProvider::new()))
    }

    pub fn decoder() -> Result<Arc<dyn MediaDecoder>> {
        Ok(Arc::new(ImageCrateDecoder::new()))
    }

    pub fn content_types() -> Result<Arc<dyn ContentTypeOracle>> {
        Ok(Arc::new(MimeGuessOracle))
    }
}

#[cfg(not(feature = "desktop-shims"))]
mod defaults {
    use super::*;

    pub fn scope_provider() -> Result<Arc<dyn SecurityScopeProvider>> {
        Err(Error::capability_missing(
            "SecurityScopeProvider",
            "A SecurityScopeProvider is required to mint and resolve access tokens. \
             Desktop: enable the 'desktop-shims' feature to use PathScopeProvider.",
        ))
    }

    pub fn decoder() -> Result<Arc<dyn MediaDecoder>> {
        Err(Error::capability_missing(
            "MediaDecoder",
            "A MediaDecoder is required to produce derivatives. \
             Desktop: enable the 'desktop-shims' feature to use ImageCrateDecoder.",
        ))
    }

    pub fn content_types() -> Result<Arc<dyn ContentTypeOracle>> {
        Err(Error::capability_missing(
            "ContentTypeOracle",
            "A ContentTypeOracle is required to classify unknown extensions. \
             Inject bridge_traits::NoContentTypes to rely on the built-in tables only.",
        ))
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    scope_provider: Option<Arc<dyn SecurityScopeProvider>>,
    decoder: Option<Arc<dyn MediaDecoder>>,
    content_types: Option<Arc<dyn ContentTypeOracle>>,
    clock: Option<Arc<dyn Clock>>,
    catalog: Option<Arc<dyn Catalog>>,
    sync: SyncConfig,
    cache: CacheConfig,
}

impl CoreConfigBuilder {
    pub fn scope_provider(mut self, provider: Arc<dyn SecurityScopeProvider>) -> Self {
        self.scope_provider = Some(provider);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn MediaDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn content_types(mut self, oracle: Arc<dyn ContentTypeOracle>) -> Self {
        self.content_types = Some(oracle);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when a required bridge was not provided and no
    ///   platform default is compiled in
    /// - `Config` when the sync or cache settings are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let scope_provider = match self.scope_provider {
            Some(provider) => provider,
            None => defaults::scope_provider()?,
        };
        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => defaults::decoder()?,
        };
        let content_types = match self.content_types {
            Some(oracle) => oracle,
            None => defaults::content_types()?,
        };

        let config = CoreConfig {
            scope_provider,
            decoder,
            content_types,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(MemoryCatalog::new())),
            sync: self.sync,
            cache: self.cache,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::content_type::NoContentTypes;

    #[test]
    fn test_cache_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.thumbnail_max_entries, 1000);
        assert_eq!(config.thumbnail_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.display_max_entries, 500);
        assert_eq!(config.display_max_bytes, 256 * 1024 * 1024);
        assert_eq!(config.max_concurrent_jobs, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_validation() {
        assert!(CacheConfig::new().with_max_concurrent_jobs(0).validate().is_err());
        assert!(CacheConfig::new().with_thumbnail_limits(0, 1).validate().is_err());
        assert!(CacheConfig::new().with_display_limits(10, 0).validate().is_err());
        assert!(CacheConfig::new()
            .with_thumbnail_limits(10, 1024)
            .with_max_concurrent_jobs(1)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_sync_defaults_and_packages() {
        let config = SyncConfig::default();
        assert!(config.skip_hidden);
        assert!(!config.follow_symlinks);
        assert!(config.is_package_extension("app"));
        assert!(config.is_package_extension(".photoslibrary"));
        assert!(config.is_package_extension("BUNDLE"));
        assert!(!config.is_package_extension("jpg"));

        let custom = SyncConfig::new().with_package_extension(".cosessiondb");
        assert!(custom.is_package_extension("cosessiondb"));
    }

    #[test]
    fn test_sync_validation() {
        assert!(SyncConfig::default().validate().is_ok());
        assert!(SyncConfig::new().with_extra_image_extension(".").validate().is_err());
        assert!(SyncConfig::new()
            .with_extra_video_extension("a/b")
            .validate()
            .is_err());
    }

    #[test]
    fn test_sync_config_deserializes_partial() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"follow_symlinks": true}"#).unwrap();
        assert!(config.follow_symlinks);
        assert!(config.skip_hidden);
        assert!(!config.package_extensions.is_empty());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_capability_fails_fast() {
        let err = CoreConfig::builder()
            .content_types(Arc::new(NoContentTypes))
            .build()
            .unwrap_err();
        match err {
            Error::CapabilityMissing { capability, .. } => {
                assert_eq!(capability, "SecurityScopeProvider")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_defaults_fill_bridges() {
        let config = CoreConfig::builder()
            .content_types(Arc::new(NoContentTypes))
            .build()
            .unwrap();
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_invalid_cache_rejected() {
        let err = CoreConfig::builder()
            .cache(CacheConfig::new().with_max_concurrent_jobs(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
