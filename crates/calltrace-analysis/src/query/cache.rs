//! Query result cache using moka.
//!
//! Keys carry the snapshot generation, so an entry computed against an old
//! graph can never answer a query against a newer one. Every rebuild also
//! drops the whole cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use calltrace_core::config::QueryConfig;
use calltrace_core::traits::TraversalDirection;
use moka::sync::Cache;

use super::{CallPath, ReachableFunction};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Reachable {
        generation: u64,
        source: String,
        direction: TraversalDirection,
        depth: u32,
    },
    Path {
        generation: u64,
        source: String,
        target: String,
        depth: u32,
    },
}

#[derive(Debug, Clone)]
pub enum CachedResult {
    Reachable(Arc<Vec<ReachableFunction>>),
    Path(Option<Arc<CallPath>>),
}

pub struct QueryCache {
    cache: Cache<QueryKey, CachedResult>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(
            config.effective_cache_capacity(),
            Duration::from_secs(config.effective_cache_ttl_seconds()),
        )
    }

    pub fn get(&self, key: &QueryKey) -> Option<CachedResult> {
        let hit = self.cache.get(key);
        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    pub fn insert(&self, key: QueryKey, value: CachedResult) {
        self.cache.insert(key, value);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hits over lookups since creation, 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.cache.entry_count())
            .field("hit_rate", &self.hit_rate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(generation: u64) -> QueryKey {
        QueryKey::Reachable {
            generation,
            source: "a".into(),
            direction: TraversalDirection::Forward,
            depth: 3,
        }
    }

    #[test]
    fn insert_and_get() {
        let cache = QueryCache::new(16, Duration::from_secs(60));
        cache.insert(key(1), CachedResult::Reachable(Arc::new(Vec::new())));
        assert!(matches!(cache.get(&key(1)), Some(CachedResult::Reachable(_))));
        assert!(cache.get(&key(2)).is_none(), "other generations miss");
    }

    #[test]
    fn hit_rate_counts_lookups() {
        let cache = QueryCache::new(16, Duration::from_secs(60));
        assert_eq!(cache.hit_rate(), 0.0);
        cache.insert(key(1), CachedResult::Path(None));
        cache.get(&key(1));
        cache.get(&key(2));
        assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn invalidate_all_clears() {
        let cache = QueryCache::new(16, Duration::from_secs(60));
        cache.insert(key(1), CachedResult::Path(None));
        cache.invalidate_all();
        assert!(cache.get(&key(1)).is_none());
    }

    #[test]
    fn entries_expire() {
        let cache = QueryCache::new(16, Duration::from_millis(20));
        cache.insert(key(1), CachedResult::Path(None));
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&key(1)).is_none());
    }
}
