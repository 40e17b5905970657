//! Two-tier derivative cache fed by the task coordinator.

use bridge_traits::media::MediaDecoder;
use core_async::coordinator::TaskCoordinator;
use core_async::sync::{lock_unpoisoned, CancellationToken};
use core_library::catalog::Catalog;
use core_library::media_kind::MediaClassifier;
use core_library::models::MediaRecord;
use core_runtime::config::{CacheConfig, CoreConfig};
use core_sync::access::AccessTokenResolver;
use futures::future::join_all;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::generator::{GenerationRequest, Generator};
use crate::image::DerivativeImage;
use crate::metrics::{CacheMetrics, Counters};
use crate::tier::{CacheTier, DerivativeKey, Tier};

/// Longest edge used for display images when the caller has no preference.
pub const DEFAULT_DISPLAY_MAX_SIZE: u32 = 4096;

type JobKey = (Tier, DerivativeKey);

struct CacheInner {
    generator: Generator,
    thumbnails: Mutex<CacheTier>,
    display: Mutex<CacheTier>,
    counters: Counters,
    /// Bumped by `clear_cache`; jobs started before a clear do not store.
    epoch: AtomicU64,
}

impl CacheInner {
    fn tier(&self, tier: Tier) -> &Mutex<CacheTier> {
        match tier {
            Tier::Thumbnail => &self.thumbnails,
            Tier::Display => &self.display,
        }
    }

    async fn generate_and_store(
        &self,
        key: DerivativeKey,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<DerivativeImage> {
        let tier = request.tier;
        // A job for this key may have stored it after the caller's lookup.
        if let Some(stored) = lock_unpoisoned(self.tier(tier)).get(&key) {
            self.counters.hit(tier);
            return Ok(stored);
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        self.counters.generation_started();

        match self.generator.generate(request, cancel).await {
            Ok(image) => {
                self.counters.miss(tier);
                let mut slot = lock_unpoisoned(self.tier(tier));
                if self.epoch.load(Ordering::Acquire) == epoch && !slot.insert(key, image.clone()) {
                    debug!(cost = image.cost(), "Derivative larger than tier budget, not cached");
                }
                Ok(image)
            }
            Err(err) => {
                self.counters.failure();
                debug!(error = %err, "Derivative generation failed");
                Err(err)
            }
        }
    }
}

/// Bounded thumbnail and display caches.
///
/// Misses are generated through a [`TaskCoordinator`], so concurrent requests
/// for the same key share one decode and no more than
/// `CacheConfig::max_concurrent_jobs` decodes run at a time. Failures are
/// returned to every waiter and never stored.
///
/// Cloning is cheap and clones share tiers, counters and slots.
#[derive(Clone)]
pub struct DerivativeCache {
    inner: Arc<CacheInner>,
    coordinator: TaskCoordinator<JobKey, Result<DerivativeImage>>,
}

impl fmt::Debug for DerivativeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeCache")
            .field("metrics", &self.metrics())
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

impl DerivativeCache {
    /// `catalog`, when given, receives access tokens refreshed during
    /// generation.
    pub fn new(
        decoder: Arc<dyn MediaDecoder>,
        resolver: AccessTokenResolver,
        classifier: MediaClassifier,
        catalog: Option<Arc<dyn Catalog>>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                generator: Generator::new(decoder, resolver, classifier, catalog),
                thumbnails: Mutex::new(CacheTier::new(
                    config.thumbnail_max_entries,
                    config.thumbnail_max_bytes,
                )),
                display: Mutex::new(CacheTier::new(
                    config.display_max_entries,
                    config.display_max_bytes,
                )),
                counters: Counters::default(),
                epoch: AtomicU64::new(0),
            }),
            coordinator: TaskCoordinator::new(config.max_concurrent_jobs),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        let classifier = MediaClassifier::new(Arc::clone(&config.content_types))
            .with_extra_extensions(
                &config.sync.extra_image_extensions,
                &config.sync.extra_video_extensions,
            );
        Self::new(
            Arc::clone(&config.decoder),
            AccessTokenResolver::new(Arc::clone(&config.scope_provider)),
            classifier,
            Some(Arc::clone(&config.catalog)),
            &config.cache,
        )
    }

    /// Thumbnail whose longest edge is about `size` pixels.
    pub async fn get_thumbnail(&self, record: &MediaRecord, size: u32) -> Result<DerivativeImage> {
        self.fetch(record, Tier::Thumbnail, size).await
    }

    /// Full-resolution decode bounded by `max_size`.
    pub async fn get_display_image(
        &self,
        record: &MediaRecord,
        max_size: u32,
    ) -> Result<DerivativeImage> {
        self.fetch(record, Tier::Display, max_size).await
    }

    /// Cached derivative for `(record, size)` without generating, counting
    /// or changing LRU order. Checks the thumbnail tier first.
    pub fn peek_cached(&self, record: &MediaRecord, size: u32) -> Option<DerivativeImage> {
        let key = DerivativeKey::new(&record.path, size.max(1));
        lock_unpoisoned(&self.inner.thumbnails)
            .peek(&key)
            .or_else(|| lock_unpoisoned(&self.inner.display).peek(&key))
    }

    /// Empties both tiers. Jobs already running finish for their callers
    /// but their results are not stored.
    pub fn clear_cache(&self) {
        let mut thumbnails = lock_unpoisoned(&self.inner.thumbnails);
        let mut display = lock_unpoisoned(&self.inner.display);
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        thumbnails.clear();
        display.clear();
        info!("Derivative cache cleared");
    }

    pub fn metrics(&self) -> CacheMetrics {
        let thumbnail = lock_unpoisoned(&self.inner.thumbnails).usage();
        let display = lock_unpoisoned(&self.inner.display).usage();
        self.inner.counters.snapshot(thumbnail, display)
    }

    /// Warms the thumbnail tier for `records`. Returns how many thumbnails
    /// are now available; failures are dropped.
    #[instrument(skip_all, fields(count = records.len(), size = size))]
    pub async fn preload(&self, records: &[MediaRecord], size: u32) -> usize {
        let results = join_all(records.iter().map(|record| self.get_thumbnail(record, size))).await;
        let ready = results.iter().filter(|result| result.is_ok()).count();
        debug!(ready, "Preload finished");
        ready
    }

    /// Drops every size cached for `record` from both tiers.
    pub fn invalidate(&self, record: &MediaRecord) -> usize {
        self.invalidate_path(&record.path)
    }

    pub fn invalidate_path(&self, path: &Path) -> usize {
        let path = core_library::path::canonicalize(path);
        let removed = lock_unpoisoned(&self.inner.thumbnails).remove_source(&path)
            + lock_unpoisoned(&self.inner.display).remove_source(&path);
        if removed > 0 {
            debug!(path = %path.display(), removed, "Invalidated derivatives");
        }
        removed
    }

    /// Activity of the underlying coordinator.
    pub fn coordinator_stats(&self) -> core_async::coordinator::CoordinatorStats {
        self.coordinator.stats()
    }

    async fn fetch(&self, record: &MediaRecord, tier: Tier, size: u32) -> Result<DerivativeImage> {
        let request = GenerationRequest::new(record, tier, size);
        let key = DerivativeKey::new(&request.path, request.size);

        if let Some(hit) = lock_unpoisoned(self.inner.tier(tier)).get(&key) {
            self.inner.counters.hit(tier);
            return Ok(hit);
        }

        let inner = Arc::clone(&self.inner);
        let job_key = (tier, key.clone());
        self.coordinator
            .run(job_key, move |cancel| async move {
                inner.generate_and_store(key, request, cancel).await
            })
            .await?
    }
}
