//! Extraction configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the parallel extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Worker threads. Default: available cores - 1 (at least 1).
    pub threads: Option<usize>,
    /// Files whose parse result reports more syntax errors than this are
    /// skipped. Default: unlimited.
    pub max_syntax_errors: Option<u32>,
}

impl ExtractionConfig {
    /// Returns the effective worker count. One core is left for the
    /// persistence writer.
    pub fn effective_threads(&self) -> usize {
        match self.threads {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }
}
