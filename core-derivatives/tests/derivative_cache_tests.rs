//! Integration tests for the derivative cache
//!
//! Most tests drive the cache with mocked or instrumented decoders over
//! placeholder files; the last scenario runs the real desktop decoder on
//! images written by the sync fixtures.

use async_trait::async_trait;
use bridge_desktop::{ImageCrateDecoder, PathScopeProvider};
use bridge_traits::{
    access::{PortableAccessToken, ResolvedToken, SecurityScopeProvider},
    content_type::NoContentTypes,
    error::{BridgeError, Result as BridgeResult},
    media::{DecodeRequest, DecodedImage, MediaDecoder},
    time::FixedClock,
};
use chrono::{DateTime, TimeZone, Utc};
use core_derivatives::{DerivativeCache, LoadError};
use core_library::{
    catalog::{Catalog, MemoryCatalog},
    media_kind::{MediaClassifier, MediaKind},
    models::MediaRecord,
};
use core_runtime::config::{CacheConfig, SyncConfig};
use core_sync::{AccessTokenResolver, FolderScanner, FolderSyncEngine};
use image::{ImageBuffer, Rgb};
use mockall::mock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Fixtures
// ============================================================================

mock! {
    pub Decoder {}

    #[async_trait]
    impl MediaDecoder for Decoder {
        async fn decode_image(&self, path: &Path, request: DecodeRequest) -> BridgeResult<DecodedImage>;
        async fn extract_video_frame(&self, path: &Path, max_pixel_size: u32) -> BridgeResult<DecodedImage>;
        async fn image_dimensions(&self, path: &Path) -> BridgeResult<(u32, u32)>;
    }
}

mock! {
    pub Scope {}

    #[async_trait]
    impl SecurityScopeProvider for Scope {
        async fn mint(&self, path: &Path) -> BridgeResult<PortableAccessToken>;
        async fn resolve(&self, token: &PortableAccessToken) -> BridgeResult<ResolvedToken>;
        fn start_access(&self, path: &Path) -> bool;
        fn stop_access(&self, path: &Path);
    }
}

/// Decoder that sleeps while decoding and records how many decodes overlap.
#[derive(Default)]
struct SlowDecoder {
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl MediaDecoder for SlowDecoder {
    async fn decode_image(&self, _path: &Path, _request: DecodeRequest) -> BridgeResult<DecodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(tiny())
    }

    async fn extract_video_frame(&self, _path: &Path, _max: u32) -> BridgeResult<DecodedImage> {
        Err(BridgeError::NotAvailable("no video".into()))
    }

    async fn image_dimensions(&self, _path: &Path) -> BridgeResult<(u32, u32)> {
        Ok((4, 4))
    }
}

/// Real decoder with a call counter in front of it.
struct CountingDecoder {
    inner: ImageCrateDecoder,
    calls: AtomicUsize,
}

#[async_trait]
impl MediaDecoder for CountingDecoder {
    async fn decode_image(&self, path: &Path, request: DecodeRequest) -> BridgeResult<DecodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decode_image(path, request).await
    }

    async fn extract_video_frame(&self, path: &Path, max: u32) -> BridgeResult<DecodedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.extract_video_frame(path, max).await
    }

    async fn image_dimensions(&self, path: &Path) -> BridgeResult<(u32, u32)> {
        self.inner.image_dimensions(path).await
    }
}

fn tiny() -> DecodedImage {
    DecodedImage::new(4, 4, vec![7u8; 64])
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// Creates placeholder files; decoders in these tests never read them.
fn placeholders(names: &[&str]) -> (TempDir, Vec<MediaRecord>) {
    let dir = tempdir().unwrap();
    let records = names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            fs::write(&path, b"placeholder").unwrap();
            MediaRecord::new(&path, None, now())
        })
        .collect();
    (dir, records)
}

fn cache_with(
    decoder: Arc<dyn MediaDecoder>,
    scope: Arc<dyn SecurityScopeProvider>,
    catalog: Option<Arc<dyn Catalog>>,
    config: CacheConfig,
) -> DerivativeCache {
    DerivativeCache::new(
        decoder,
        AccessTokenResolver::new(scope),
        MediaClassifier::new(Arc::new(NoContentTypes)),
        catalog,
        &config,
    )
}

fn cache(decoder: Arc<dyn MediaDecoder>) -> DerivativeCache {
    cache_with(
        decoder,
        Arc::new(PathScopeProvider::new()),
        None,
        CacheConfig::default(),
    )
}

// ============================================================================
// Coalescing and concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_key_share_a_generation() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    let requests = (0..10).map(|_| cache.get_thumbnail(&records[0], 150));
    let results = futures::future::join_all(requests).await;

    let first = results[0].as_ref().unwrap().clone();
    for result in &results {
        assert!(result.as_ref().unwrap().same_as(&first));
    }
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

    let metrics = cache.metrics();
    assert_eq!(metrics.generations, 1);
    assert_eq!(metrics.thumb_misses, 1);
    assert_eq!(cache.coordinator_stats().coalesced, 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abandoned_request_is_not_decoded_twice() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), cache.get_thumbnail(&records[0], 150)).await;
    assert!(abandoned.is_err());

    let image = cache.get_thumbnail(&records[0], 150).await.unwrap();

    assert_eq!(image.width(), 4);
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(decoder.peak.load(Ordering::SeqCst), 1);
    assert!(cache.peek_cached(&records[0], 150).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn no_more_than_four_generations_run_at_once() {
    let names: Vec<String> = (0..12).map(|i| format!("img_{i}.jpg")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let (_dir, records) = placeholders(&names);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    let results =
        futures::future::join_all(records.iter().map(|record| cache.get_thumbnail(record, 64)))
            .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 12);
    assert!(decoder.peak.load(Ordering::SeqCst) <= 4);
    assert!(cache.coordinator_stats().peak_running <= 4);
    assert_eq!(cache.metrics().generations, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_limit_is_configurable() {
    let names: Vec<String> = (0..6).map(|i| format!("img_{i}.png")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let (_dir, records) = placeholders(&names);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache_with(
        decoder.clone(),
        Arc::new(PathScopeProvider::new()),
        None,
        CacheConfig::default().with_max_concurrent_jobs(1),
    );

    assert_eq!(cache.preload(&records, 64).await, 6);
    assert_eq!(decoder.peak.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Lookup
// ============================================================================

#[tokio::test]
async fn peek_returns_the_generated_image_without_generating() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    assert!(cache.peek_cached(&records[0], 150).is_none());

    let image = cache.get_thumbnail(&records[0], 150).await.unwrap();
    let peeked = cache.peek_cached(&records[0], 150).unwrap();
    assert!(peeked.same_as(&image));
    assert!(cache.peek_cached(&records[0], 151).is_none());

    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    let metrics = cache.metrics();
    assert_eq!(metrics.thumb_hits, 0);
    assert_eq!(metrics.generations, 1);
}

#[tokio::test]
async fn second_request_is_a_hit() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    let first = cache.get_thumbnail(&records[0], 150).await.unwrap();
    let second = cache.get_thumbnail(&records[0], 150).await.unwrap();

    assert!(first.same_as(&second));
    let metrics = cache.metrics();
    assert_eq!((metrics.thumb_hits, metrics.thumb_misses), (1, 1));
    assert_eq!(metrics.thumbnail_hit_rate(), 0.5);
    assert_eq!(metrics.thumbnail.entries, 1);
    assert_eq!(metrics.thumbnail.cost, 64);
}

#[tokio::test]
async fn tiers_are_independent() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    cache.get_thumbnail(&records[0], 512).await.unwrap();
    cache.get_display_image(&records[0], 512).await.unwrap();

    assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    let metrics = cache.metrics();
    assert_eq!(metrics.thumb_misses, 1);
    assert_eq!(metrics.display_misses, 1);
    assert_eq!(metrics.display.entries, 1);
}

#[tokio::test]
async fn tiers_request_the_right_decode() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let mut decoder = MockDecoder::new();
    decoder
        .expect_decode_image()
        .withf(|_, request| *request == DecodeRequest::thumbnail(300))
        .times(1)
        .returning(|_, _| Ok(tiny()));
    decoder
        .expect_decode_image()
        .withf(|_, request| *request == DecodeRequest::full_resolution(2048))
        .times(1)
        .returning(|_, _| Ok(tiny()));
    let cache = cache(Arc::new(decoder));

    let thumb = cache.get_thumbnail(&records[0], 150).await.unwrap();
    let display = cache.get_display_image(&records[0], 2048).await.unwrap();

    assert_eq!(thumb.source_kind(), MediaKind::Image);
    assert_eq!(display.width(), 4);
}

#[tokio::test]
async fn videos_yield_a_frame() {
    let (_dir, records) = placeholders(&["clip.mov"]);
    let mut decoder = MockDecoder::new();
    decoder
        .expect_extract_video_frame()
        .withf(|_, max| *max == 640)
        .times(1)
        .returning(|_, _| Ok(tiny()));
    let cache = cache(Arc::new(decoder));

    let frame = cache.get_display_image(&records[0], 640).await.unwrap();
    assert_eq!(frame.source_kind(), MediaKind::Video);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failed_frame_extraction_is_unsupported() {
    let (_dir, records) = placeholders(&["clip.mp4"]);
    let mut decoder = MockDecoder::new();
    decoder
        .expect_extract_video_frame()
        .returning(|_, _| Err(BridgeError::OperationFailed("ffmpeg exited 1".into())));
    let cache = cache(Arc::new(decoder));

    let err = cache.get_thumbnail(&records[0], 150).await.unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn failures_are_not_cached() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let mut decoder = MockDecoder::new();
    let mut seq = mockall::Sequence::new();
    decoder
        .expect_decode_image()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(BridgeError::CorruptedData("truncated".into())));
    decoder
        .expect_decode_image()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(tiny()));
    let cache = cache(Arc::new(decoder));

    let err = cache.get_thumbnail(&records[0], 150).await.unwrap_err();
    assert_eq!(err, LoadError::CorruptedData("truncated".into()));
    assert!(cache.peek_cached(&records[0], 150).is_none());

    cache.get_thumbnail(&records[0], 150).await.unwrap();
    let metrics = cache.metrics();
    assert_eq!(metrics.generations, 2);
    assert_eq!(metrics.failures, 1);
    assert_eq!(metrics.thumb_misses, 1);
}

#[tokio::test]
async fn missing_source_is_file_not_found() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gone.jpg");
    let record = MediaRecord::new(&path, None, now());
    let cache = cache(Arc::new(MockDecoder::new()));

    let err = cache.get_thumbnail(&record, 150).await.unwrap_err();
    assert_eq!(err, LoadError::FileNotFound(record.path.clone()));
}

#[tokio::test]
async fn unclassifiable_source_is_unsupported() {
    let (_dir, records) = placeholders(&["notes.txt"]);
    let cache = cache(Arc::new(MockDecoder::new()));

    let err = cache.get_thumbnail(&records[0], 150).await.unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn unresolvable_token_is_permission_denied() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let mut record = records[0].clone();
    record.access_token = Some(PortableAccessToken::new(b"garbage".to_vec()));

    let mut scope = MockScope::new();
    scope
        .expect_resolve()
        .returning(|_| Err(BridgeError::InvalidToken("not base64".into())));
    scope.expect_start_access().never();
    let cache = cache_with(
        Arc::new(MockDecoder::new()),
        Arc::new(scope),
        None,
        CacheConfig::default(),
    );

    let err = cache.get_thumbnail(&record, 150).await.unwrap_err();
    assert!(matches!(err, LoadError::PermissionDenied(_)));
}

#[tokio::test]
async fn refused_scope_is_permission_denied() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let mut record = records[0].clone();
    record.access_token = Some(PortableAccessToken::new(b"token".to_vec()));
    let target = record.path.clone();

    let mut scope = MockScope::new();
    scope.expect_resolve().returning(move |_| {
        Ok(ResolvedToken {
            path: target.clone(),
            is_stale: false,
        })
    });
    scope.expect_start_access().returning(|_| false);
    scope.expect_stop_access().never();
    let cache = cache_with(
        Arc::new(MockDecoder::new()),
        Arc::new(scope),
        None,
        CacheConfig::default(),
    );

    let err = cache.get_thumbnail(&record, 150).await.unwrap_err();
    assert!(matches!(err, LoadError::PermissionDenied(_)));
}

#[tokio::test]
async fn stale_token_is_refreshed_and_stored() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let mut record = records[0].clone();
    record.access_token = Some(PortableAccessToken::new(b"old".to_vec()));
    let target = record.path.clone();
    let catalog = Arc::new(MemoryCatalog::with_records([record.clone()]).unwrap());

    let mut scope = MockScope::new();
    scope.expect_resolve().returning(move |_| {
        Ok(ResolvedToken {
            path: target.clone(),
            is_stale: true,
        })
    });
    scope.expect_start_access().times(1).returning(|_| true);
    scope.expect_stop_access().times(1).returning(|_| ());
    scope
        .expect_mint()
        .times(1)
        .returning(|_| Ok(PortableAccessToken::new(b"fresh".to_vec())));

    let mut decoder = MockDecoder::new();
    decoder.expect_decode_image().returning(|_, _| Ok(tiny()));
    let cache = cache_with(
        Arc::new(decoder),
        Arc::new(scope),
        Some(catalog.clone() as Arc<dyn Catalog>),
        CacheConfig::default(),
    );

    cache.get_thumbnail(&record, 150).await.unwrap();

    let stored = catalog.find_record(record.id).await.unwrap().unwrap();
    assert_eq!(
        stored.access_token,
        Some(PortableAccessToken::new(b"fresh".to_vec()))
    );
}

// ============================================================================
// Eviction and invalidation
// ============================================================================

#[tokio::test]
async fn least_recently_used_thumbnail_is_evicted() {
    let (_dir, records) = placeholders(&["a.jpg", "b.jpg", "c.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache_with(
        decoder.clone(),
        Arc::new(PathScopeProvider::new()),
        None,
        CacheConfig::default().with_thumbnail_limits(2, 1024 * 1024),
    );

    cache.get_thumbnail(&records[0], 64).await.unwrap();
    cache.get_thumbnail(&records[1], 64).await.unwrap();
    cache.get_thumbnail(&records[0], 64).await.unwrap();
    cache.get_thumbnail(&records[2], 64).await.unwrap();

    assert!(cache.peek_cached(&records[0], 64).is_some());
    assert!(cache.peek_cached(&records[1], 64).is_none());
    assert!(cache.peek_cached(&records[2], 64).is_some());
    assert_eq!(cache.metrics().thumbnail.entries, 2);
}

#[tokio::test]
async fn byte_budget_bounds_the_tier() {
    let (_dir, records) = placeholders(&["a.jpg", "b.jpg", "c.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache_with(
        decoder.clone(),
        Arc::new(PathScopeProvider::new()),
        None,
        CacheConfig::default().with_thumbnail_limits(100, 128),
    );

    for record in &records {
        cache.get_thumbnail(record, 64).await.unwrap();
    }

    let usage = cache.metrics().thumbnail;
    assert_eq!(usage.entries, 2);
    assert_eq!(usage.cost, 128);
}

#[tokio::test]
async fn clear_cache_empties_both_tiers() {
    let (_dir, records) = placeholders(&["a.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    cache.get_thumbnail(&records[0], 150).await.unwrap();
    cache.get_display_image(&records[0], 1024).await.unwrap();
    cache.clear_cache();

    let metrics = cache.metrics();
    assert_eq!(metrics.thumbnail.entries, 0);
    assert_eq!(metrics.display.entries, 0);
    assert!(cache.peek_cached(&records[0], 150).is_none());

    cache.get_thumbnail(&records[0], 150).await.unwrap();
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invalidate_drops_every_size_of_a_source() {
    let (_dir, records) = placeholders(&["a.jpg", "b.jpg"]);
    let decoder = Arc::new(SlowDecoder::default());
    let cache = cache(decoder.clone());

    cache.get_thumbnail(&records[0], 64).await.unwrap();
    cache.get_thumbnail(&records[0], 150).await.unwrap();
    cache.get_display_image(&records[0], 1024).await.unwrap();
    cache.get_thumbnail(&records[1], 64).await.unwrap();

    assert_eq!(cache.invalidate(&records[0]), 3);
    assert!(cache.peek_cached(&records[1], 64).is_some());
    assert_eq!(cache.metrics().thumbnail.entries, 1);
}

// ============================================================================
// End to end
// ============================================================================

fn write_image(path: &Path) {
    let image = ImageBuffer::from_fn(48, 32, |x, y| Rgb([(x * 5) as u8, (y * 5) as u8, 120]));
    image.save(path).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn synced_folder_thumbnails_are_generated_once() {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("shoot");
    fs::create_dir_all(&folder).unwrap();
    let files: Vec<PathBuf> = (0..8).map(|i| folder.join(format!("IMG_{i:04}.png"))).collect();
    for file in &files {
        write_image(file);
    }

    let catalog = Arc::new(MemoryCatalog::new());
    let provider: Arc<dyn SecurityScopeProvider> = Arc::new(PathScopeProvider::new());
    let engine = FolderSyncEngine::new(
        catalog.clone(),
        AccessTokenResolver::new(provider.clone()),
        FolderScanner::new(
            SyncConfig::default(),
            MediaClassifier::new(Arc::new(NoContentTypes)),
        ),
        Arc::new(FixedClock(now())),
    );

    let first = engine.sync(&folder, &[], &[], None).await.unwrap();
    assert_eq!((first.added_count, first.removed_count), (8, 0));
    assert!(!first.folder_missing);
    assert!(first.errors.is_empty());

    fs::remove_file(&files[0]).unwrap();
    fs::remove_file(&files[1]).unwrap();
    let records = catalog.fetch_records().await.unwrap();
    let bookmarks = catalog.fetch_bookmarks().await.unwrap();
    let second = engine.sync(&folder, &records, &bookmarks, None).await.unwrap();
    assert_eq!((second.added_count, second.removed_count), (0, 2));
    assert!(!second.folder_missing);

    let survivors = catalog.fetch_records().await.unwrap();
    assert_eq!(survivors.len(), 6);

    let decoder = Arc::new(CountingDecoder {
        inner: ImageCrateDecoder::new(),
        calls: AtomicUsize::new(0),
    });
    let cache = cache_with(decoder.clone(), provider, Some(catalog.clone() as Arc<dyn Catalog>), CacheConfig::default());

    let record = &survivors[0];
    let (a, b) = tokio::join!(cache.get_thumbnail(record, 150), cache.get_thumbnail(record, 150));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.same_as(&b));
    assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.metrics().generations, 1);
    assert!(a.width() > 0 && a.height() > 0);
}
