//! Storage configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{BATCH_CHANNEL_CAPACITY, BATCH_WRITE_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Rows written per chunk inside a transaction. Default: 500.
    pub batch_size: Option<usize>,
    /// Writer queue capacity; producers block when it is full. Default: 1024.
    pub channel_capacity: Option<usize>,
    /// Read connections in the pool. Default: 4.
    pub read_pool_size: Option<usize>,
}

impl StorageConfig {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(BATCH_WRITE_SIZE)
    }

    pub fn effective_channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(BATCH_CHANNEL_CAPACITY)
    }

    pub fn effective_read_pool_size(&self) -> usize {
        self.read_pool_size.unwrap_or(4)
    }
}
