//! Tracing setup.

use calltrace_core::tracing::{init_tracing, metrics};

#[test]
fn init_is_idempotent() {
    std::env::set_var("CALLTRACE_LOG", "calltrace_core=debug");
    init_tracing();
    init_tracing();
    tracing::info!(target: "calltrace_core", "tracing initialized twice without panicking");
}

#[test]
fn span_fields_are_distinct() {
    let names = [
        metrics::FILES_FAILED,
        metrics::FUNCTIONS,
        metrics::EDGES,
        metrics::DURATION_MS,
        metrics::RESOLUTION_RATE,
        metrics::INCOMING_RERESOLVED,
        metrics::BATCH_WRITE_TIME,
        metrics::CACHE_HIT_RATE,
    ];
    let mut sorted = names.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), names.len());

    // Recording through the constants works on a span that declared them.
    let span = tracing::info_span!("build", functions = tracing::field::Empty);
    span.record(metrics::FUNCTIONS, 3_usize);
}
