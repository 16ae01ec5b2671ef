//! Event payload types.

/// Payload for `on_build_started`.
#[derive(Debug, Clone)]
pub struct BuildStartedEvent {
    pub file_count: usize,
    pub incremental: bool,
}

/// Payload for `on_build_complete`.
#[derive(Debug, Clone)]
pub struct BuildCompleteEvent {
    pub status: String,
    pub functions: usize,
    pub edges: usize,
    pub resolution_rate: f64,
    pub duration_ms: u64,
}

/// Payload for `on_update_complete`.
#[derive(Debug, Clone)]
pub struct UpdateCompleteEvent {
    pub status: String,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub incoming_reresolved: usize,
    pub duration_ms: u64,
}

/// Payload for `on_extraction_failed`.
#[derive(Debug, Clone)]
pub struct ExtractionFailedEvent {
    pub file: String,
    pub message: String,
}

/// Payload for `on_low_resolution`.
#[derive(Debug, Clone)]
pub struct LowResolutionEvent {
    pub language: String,
    pub resolved: usize,
    pub total: usize,
    pub rate: f64,
}

/// Payload for `on_resolution_regressed`.
#[derive(Debug, Clone)]
pub struct ResolutionRegressedEvent {
    pub language: String,
    pub previous_rate: f64,
    pub current_rate: f64,
}
