//! Query layer configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_IN_MEMORY_THRESHOLD,
    DEFAULT_MAX_DEPTH, DEFAULT_PAGE_SIZE,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QueryConfig {
    /// Default traversal depth bound. Default: 10.
    pub max_depth: Option<u32>,
    /// Query cache capacity in entries. Default: 1024.
    pub cache_capacity: Option<u64>,
    /// Query cache time-to-live in seconds. Default: 300.
    pub cache_ttl_seconds: Option<u64>,
    /// Function count above which traversal is served by storage. Default: 500000.
    pub in_memory_threshold: Option<usize>,
    /// Default page size for entry-point and search listings. Default: 50.
    pub page_size: Option<usize>,
}

impl QueryConfig {
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    pub fn effective_cache_capacity(&self) -> u64 {
        self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    pub fn effective_cache_ttl_seconds(&self) -> u64 {
        self.cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS)
    }

    pub fn effective_in_memory_threshold(&self) -> usize {
        self.in_memory_threshold
            .unwrap_or(DEFAULT_IN_MEMORY_THRESHOLD)
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}
