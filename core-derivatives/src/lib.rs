//! # Derivative Cache
//!
//! On-demand thumbnails, display images and video frames held in two
//! bounded in-memory tiers.
//!
//! ## Overview
//!
//! - [`DerivativeCache`] - lookup, coalesced generation, eviction and metrics
//! - [`CacheTier`] - one LRU tier with an entry and a byte budget
//! - [`LoadError`] - typed generation failure, never cached
//!
//! A miss becomes a job on a [`core_async::TaskCoordinator`] keyed by tier,
//! canonical path and pixel size. The job opens the record's access scope,
//! decodes through the host [`MediaDecoder`](bridge_traits::MediaDecoder) and
//! stores the result in its tier.

pub mod cache;
pub mod error;
mod generator;
pub mod image;
pub mod metrics;
pub mod tier;

pub use cache::{DerivativeCache, DEFAULT_DISPLAY_MAX_SIZE};
pub use error::{LoadError, Result};
pub use generator::THUMBNAIL_OVERSAMPLE;
pub use image::DerivativeImage;
pub use metrics::CacheMetrics;
pub use tier::{CacheTier, DerivativeKey, Tier, TierUsage};
