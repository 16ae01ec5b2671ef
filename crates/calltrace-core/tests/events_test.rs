//! Tests for the call-graph event system.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use calltrace_core::events::dispatcher::EventDispatcher;
use calltrace_core::events::handler::CallGraphEventHandler;
use calltrace_core::events::types::*;

#[derive(Default)]
struct CountingHandler {
    build_started: AtomicUsize,
    build_complete: AtomicUsize,
    update_complete: AtomicUsize,
    extraction_failed: AtomicUsize,
    low_resolution: AtomicUsize,
    regressed: AtomicUsize,
}

impl CallGraphEventHandler for CountingHandler {
    fn on_build_started(&self, _event: &BuildStartedEvent) {
        self.build_started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_build_complete(&self, _event: &BuildCompleteEvent) {
        self.build_complete.fetch_add(1, Ordering::Relaxed);
    }

    fn on_update_complete(&self, _event: &UpdateCompleteEvent) {
        self.update_complete.fetch_add(1, Ordering::Relaxed);
    }

    fn on_extraction_failed(&self, _event: &ExtractionFailedEvent) {
        self.extraction_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_low_resolution(&self, _event: &LowResolutionEvent) {
        self.low_resolution.fetch_add(1, Ordering::Relaxed);
    }

    fn on_resolution_regressed(&self, _event: &ResolutionRegressedEvent) {
        self.regressed.fetch_add(1, Ordering::Relaxed);
    }
}

fn started() -> BuildStartedEvent {
    BuildStartedEvent {
        file_count: 3,
        incremental: false,
    }
}

#[test]
fn handler_defaults_are_noops() {
    struct Quiet;
    impl CallGraphEventHandler for Quiet {}

    let handler = Quiet;
    handler.on_build_started(&started());
    handler.on_extraction_failed(&ExtractionFailedEvent {
        file: "src/a.ts".into(),
        message: "empty path".into(),
    });
    handler.on_resolution_regressed(&ResolutionRegressedEvent {
        language: "typescript".into(),
        previous_rate: 0.9,
        current_rate: 0.5,
    });
}

#[test]
fn empty_dispatcher_accepts_every_event() {
    let dispatcher = EventDispatcher::new();
    assert_eq!(dispatcher.handler_count(), 0);

    dispatcher.emit_build_started(&started());
    dispatcher.emit_build_complete(&BuildCompleteEvent {
        status: "complete".into(),
        functions: 0,
        edges: 0,
        resolution_rate: 0.0,
        duration_ms: 1,
    });
    dispatcher.emit_low_resolution(&LowResolutionEvent {
        language: "python".into(),
        resolved: 1,
        total: 10,
        rate: 0.1,
    });
}

#[test]
fn every_handler_receives_every_event() {
    let mut dispatcher = EventDispatcher::new();
    let first = Arc::new(CountingHandler::default());
    let second = Arc::new(CountingHandler::default());
    dispatcher.register(first.clone());
    dispatcher.register(second.clone());
    assert_eq!(dispatcher.handler_count(), 2);

    dispatcher.emit_build_started(&started());
    dispatcher.emit_update_complete(&UpdateCompleteEvent {
        status: "complete".into(),
        added: 1,
        modified: 2,
        removed: 0,
        incoming_reresolved: 4,
        duration_ms: 5,
    });
    dispatcher.emit_extraction_failed(&ExtractionFailedEvent {
        file: "src/bad.ts".into(),
        message: "too many syntax errors".into(),
    });
    dispatcher.emit_resolution_regressed(&ResolutionRegressedEvent {
        language: "typescript".into(),
        previous_rate: 0.8,
        current_rate: 0.6,
    });

    for handler in [&first, &second] {
        assert_eq!(handler.build_started.load(Ordering::Relaxed), 1);
        assert_eq!(handler.build_complete.load(Ordering::Relaxed), 0);
        assert_eq!(handler.update_complete.load(Ordering::Relaxed), 1);
        assert_eq!(handler.extraction_failed.load(Ordering::Relaxed), 1);
        assert_eq!(handler.regressed.load(Ordering::Relaxed), 1);
        assert_eq!(handler.low_resolution.load(Ordering::Relaxed), 0);
    }
}

#[test]
fn panicking_handler_does_not_block_later_handlers() {
    struct Panics;
    impl CallGraphEventHandler for Panics {
        fn on_build_started(&self, _event: &BuildStartedEvent) {
            panic!("handler blew up");
        }
    }

    let mut dispatcher = EventDispatcher::new();
    let counting = Arc::new(CountingHandler::default());
    dispatcher.register(Arc::new(Panics));
    dispatcher.register(counting.clone());

    dispatcher.emit_build_started(&started());
    dispatcher.emit_build_started(&started());

    assert_eq!(counting.build_started.load(Ordering::Relaxed), 2);
}

#[test]
fn payload_reaches_handler_intact() {
    #[derive(Default)]
    struct Capture {
        seen: Mutex<Option<LowResolutionEvent>>,
    }
    impl CallGraphEventHandler for Capture {
        fn on_low_resolution(&self, event: &LowResolutionEvent) {
            *self.seen.lock().unwrap() = Some(event.clone());
        }
    }

    let mut dispatcher = EventDispatcher::new();
    let capture = Arc::new(Capture::default());
    dispatcher.register(capture.clone());

    dispatcher.emit_low_resolution(&LowResolutionEvent {
        language: "go".into(),
        resolved: 12,
        total: 60,
        rate: 0.2,
    });

    let seen = capture.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.language, "go");
    assert_eq!(seen.resolved, 12);
    assert_eq!(seen.total, 60);
    assert!((seen.rate - 0.2).abs() < f64::EPSILON);
}

#[test]
fn cloned_dispatcher_shares_handlers() {
    let mut dispatcher = EventDispatcher::new();
    let counting = Arc::new(CountingHandler::default());
    dispatcher.register(counting.clone());

    let clone = dispatcher.clone();
    clone.emit_build_started(&started());
    dispatcher.emit_build_started(&started());

    assert_eq!(counting.build_started.load(Ordering::Relaxed), 2);
}

#[test]
fn dispatcher_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EventDispatcher>();
}
