//! EventDispatcher: synchronous dispatch, zero overhead when empty.

use std::sync::Arc;

use super::handler::CallGraphEventHandler;
use super::types::*;

/// Synchronous event dispatcher wrapping a list of handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn CallGraphEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event handler.
    pub fn register(&mut self, handler: Arc<dyn CallGraphEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Handlers that panic are caught and do not prevent subsequent handlers
    /// from receiving the event.
    fn emit<F: Fn(&dyn CallGraphEventHandler)>(&self, f: F) {
        for handler in &self.handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                tracing::error!("event handler panicked");
            }
        }
    }

    pub fn emit_build_started(&self, event: &BuildStartedEvent) {
        self.emit(|h| h.on_build_started(event));
    }

    pub fn emit_build_complete(&self, event: &BuildCompleteEvent) {
        self.emit(|h| h.on_build_complete(event));
    }

    pub fn emit_update_complete(&self, event: &UpdateCompleteEvent) {
        self.emit(|h| h.on_update_complete(event));
    }

    pub fn emit_extraction_failed(&self, event: &ExtractionFailedEvent) {
        self.emit(|h| h.on_extraction_failed(event));
    }

    pub fn emit_low_resolution(&self, event: &LowResolutionEvent) {
        self.emit(|h| h.on_low_resolution(event));
    }

    pub fn emit_resolution_regressed(&self, event: &ResolutionRegressedEvent) {
        self.emit(|h| h.on_resolution_regressed(event));
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
