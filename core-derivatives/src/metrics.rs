//! Hit/miss accounting.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tier::{Tier, TierUsage};

/// Point-in-time counters.
///
/// A hit is a request served from a tier. A miss is counted once per
/// successful generation, so coalesced callers of one job add a single miss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub thumb_hits: u64,
    pub thumb_misses: u64,
    pub display_hits: u64,
    pub display_misses: u64,
    /// Generation jobs started, successful or not
    pub generations: u64,
    /// Generation jobs that produced a `LoadError`
    pub failures: u64,
    pub thumbnail: TierUsage,
    pub display: TierUsage,
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

impl CacheMetrics {
    pub fn thumbnail_hit_rate(&self) -> f64 {
        ratio(self.thumb_hits, self.thumb_misses)
    }

    pub fn display_hit_rate(&self) -> f64 {
        ratio(self.display_hits, self.display_misses)
    }

    pub fn hit_rate(&self) -> f64 {
        ratio(
            self.thumb_hits + self.display_hits,
            self.thumb_misses + self.display_misses,
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    thumb_hits: AtomicU64,
    thumb_misses: AtomicU64,
    display_hits: AtomicU64,
    display_misses: AtomicU64,
    generations: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    pub fn hit(&self, tier: Tier) {
        match tier {
            Tier::Thumbnail => &self.thumb_hits,
            Tier::Display => &self.display_hits,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self, tier: Tier) {
        match tier {
            Tier::Thumbnail => &self.thumb_misses,
            Tier::Display => &self.display_misses,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_started(&self) {
        self.generations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, thumbnail: TierUsage, display: TierUsage) -> CacheMetrics {
        CacheMetrics {
            thumb_hits: self.thumb_hits.load(Ordering::Relaxed),
            thumb_misses: self.thumb_misses.load(Ordering::Relaxed),
            display_hits: self.display_hits.load(Ordering::Relaxed),
            display_misses: self.display_misses.load(Ordering::Relaxed),
            generations: self.generations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            thumbnail,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rates() {
        let counters = Counters::default();
        assert_eq!(counters.snapshot(TierUsage::default(), TierUsage::default()).hit_rate(), 0.0);

        counters.hit(Tier::Thumbnail);
        counters.hit(Tier::Thumbnail);
        counters.hit(Tier::Thumbnail);
        counters.miss(Tier::Thumbnail);
        counters.miss(Tier::Display);
        let metrics = counters.snapshot(TierUsage::default(), TierUsage::default());

        assert_eq!(metrics.thumbnail_hit_rate(), 0.75);
        assert_eq!(metrics.display_hit_rate(), 0.0);
        assert_eq!(metrics.hit_rate(), 0.6);
    }
}
