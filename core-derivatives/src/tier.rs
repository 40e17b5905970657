//! One bounded cache tier: LRU order with both an entry and a byte budget.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::image::DerivativeImage;

/// Cache key: canonical source path plus the requested pixel dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    pub path: PathBuf,
    pub dimension: u32,
}

impl DerivativeKey {
    pub fn new(path: &Path, dimension: u32) -> Self {
        Self {
            path: core_library::path::canonicalize(path),
            dimension,
        }
    }
}

/// Which tier a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Thumbnail,
    Display,
}

/// Occupancy snapshot of a tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierUsage {
    pub entries: usize,
    pub cost: u64,
    pub max_entries: usize,
    pub max_cost: u64,
}

#[derive(Debug)]
pub struct CacheTier {
    entries: LruCache<DerivativeKey, DerivativeImage>,
    cost: u64,
    max_entries: usize,
    max_cost: u64,
}

impl CacheTier {
    pub fn new(max_entries: usize, max_cost: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            cost: 0,
            max_entries: max_entries.max(1),
            max_cost: max_cost.max(1),
        }
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&mut self, key: &DerivativeKey) -> Option<DerivativeImage> {
        self.entries.get(key).cloned()
    }

    /// Looks up `key` without touching recency.
    pub fn peek(&self, key: &DerivativeKey) -> Option<DerivativeImage> {
        self.entries.peek(key).cloned()
    }

    /// Stores `image`, evicting least recently used entries until both
    /// bounds hold. An image larger than the whole byte budget is not stored.
    pub fn insert(&mut self, key: DerivativeKey, image: DerivativeImage) -> bool {
        let cost = image.cost();
        if cost > self.max_cost {
            return false;
        }
        if let Some(previous) = self.entries.put(key, image) {
            self.cost -= previous.cost();
        }
        self.cost += cost;

        while self.entries.len() > self.max_entries || self.cost > self.max_cost {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.cost -= evicted.cost(),
                None => break,
            }
        }
        true
    }

    /// Drops every dimension cached for `path`. Returns how many went.
    pub fn remove_source(&mut self, path: &Path) -> usize {
        let doomed: Vec<DerivativeKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.path == path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            if let Some(image) = self.entries.pop(key) {
                self.cost -= image.cost();
            }
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cost = 0;
    }

    pub fn usage(&self) -> TierUsage {
        TierUsage {
            entries: self.entries.len(),
            cost: self.cost,
            max_entries: self.max_entries,
            max_cost: self.max_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::media::DecodedImage;
    use core_library::media_kind::MediaKind;

    fn image(bytes: usize) -> DerivativeImage {
        DerivativeImage::new(DecodedImage::new(1, 1, vec![0u8; bytes]), MediaKind::Image)
    }

    fn key(name: &str, dimension: u32) -> DerivativeKey {
        DerivativeKey::new(Path::new(&format!("/p/{name}")), dimension)
    }

    #[test]
    fn evicts_least_recently_used_by_count() {
        let mut tier = CacheTier::new(2, 1_000);
        tier.insert(key("a", 1), image(10));
        tier.insert(key("b", 1), image(10));
        assert!(tier.get(&key("a", 1)).is_some());
        tier.insert(key("c", 1), image(10));

        assert!(tier.get(&key("b", 1)).is_none());
        assert!(tier.get(&key("a", 1)).is_some());
        assert!(tier.get(&key("c", 1)).is_some());
        assert_eq!(tier.usage().cost, 20);
    }

    #[test]
    fn evicts_by_cost() {
        let mut tier = CacheTier::new(100, 100);
        tier.insert(key("a", 1), image(40));
        tier.insert(key("b", 1), image(40));
        tier.insert(key("c", 1), image(40));

        let usage = tier.usage();
        assert_eq!(usage.entries, 2);
        assert_eq!(usage.cost, 80);
        assert!(tier.get(&key("a", 1)).is_none());
    }

    #[test]
    fn oversized_entry_is_not_stored() {
        let mut tier = CacheTier::new(10, 50);
        tier.insert(key("a", 1), image(10));
        assert!(!tier.insert(key("huge", 1), image(51)));
        assert_eq!(tier.usage().entries, 1);
    }

    #[test]
    fn replacing_a_key_keeps_cost_exact() {
        let mut tier = CacheTier::new(10, 1_000);
        tier.insert(key("a", 1), image(10));
        tier.insert(key("a", 1), image(30));
        assert_eq!(tier.usage(), TierUsage { entries: 1, cost: 30, max_entries: 10, max_cost: 1_000 });
    }

    #[test]
    fn remove_source_drops_all_dimensions() {
        let mut tier = CacheTier::new(10, 1_000);
        tier.insert(key("a", 64), image(10));
        tier.insert(key("a", 256), image(10));
        tier.insert(key("b", 64), image(10));

        assert_eq!(tier.remove_source(Path::new("/p/a")), 2);
        assert_eq!(tier.usage().entries, 1);
        assert_eq!(tier.usage().cost, 10);
        tier.clear();
        assert_eq!(tier.usage().entries, 0);
    }
}
