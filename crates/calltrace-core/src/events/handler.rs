//! CallGraphEventHandler trait, all methods with no-op defaults.

use super::types::*;

/// Trait for observing call-graph lifecycle events.
///
/// Handlers only override the events they care about. `Send + Sync` is
/// required because builds run on worker threads.
pub trait CallGraphEventHandler: Send + Sync {
    // ---- Build lifecycle ----
    fn on_build_started(&self, _event: &BuildStartedEvent) {}
    fn on_build_complete(&self, _event: &BuildCompleteEvent) {}
    fn on_update_complete(&self, _event: &UpdateCompleteEvent) {}

    // ---- Extraction ----
    fn on_extraction_failed(&self, _event: &ExtractionFailedEvent) {}

    // ---- Resolution health ----
    fn on_low_resolution(&self, _event: &LowResolutionEvent) {}
    fn on_resolution_regressed(&self, _event: &ResolutionRegressedEvent) {}
}
