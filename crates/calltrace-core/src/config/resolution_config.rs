//! Resolution configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LOW_RATE_THRESHOLD, DEFAULT_REGRESSION_TOLERANCE};

/// Configuration for the resolver and its diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Per-language rate under which a low-resolution warning fires. Default: 0.30.
    pub low_rate_threshold: Option<f64>,
    /// Allowed drop in a language's rate between builds. Default: 0.10.
    pub regression_tolerance: Option<f64>,
    /// Skip fuzzy resolution for very common names. Default: true.
    pub fuzzy_blocklist: Option<bool>,
    /// Additional names never resolved by fuzzy matching.
    #[serde(default)]
    pub extra_blocklist: Vec<String>,
    /// Additional class decorators that register a DI provider.
    #[serde(default)]
    pub extra_di_markers: Vec<String>,
}

impl ResolutionConfig {
    pub fn effective_low_rate_threshold(&self) -> f64 {
        self.low_rate_threshold.unwrap_or(DEFAULT_LOW_RATE_THRESHOLD)
    }

    pub fn effective_regression_tolerance(&self) -> f64 {
        self.regression_tolerance
            .unwrap_or(DEFAULT_REGRESSION_TOLERANCE)
    }

    pub fn effective_fuzzy_blocklist(&self) -> bool {
        self.fuzzy_blocklist.unwrap_or(true)
    }
}
