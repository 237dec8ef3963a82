//! Metrics and observability utilities
//!
//! Counters and gauges for the snowballing run, using the `metrics` facade.
//! Nothing is exported unless the binary installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, gauge, Unit};

/// Metrics prefix for all Snowball metrics
pub const METRICS_PREFIX: &str = "snowball";

/// Register all metric descriptions
pub fn register_metrics() {
    // Expansion metrics
    describe_counter!(
        format!("{}_papers_expanded_total", METRICS_PREFIX),
        Unit::Count,
        "Papers whose neighbors were resolved"
    );

    describe_counter!(
        format!("{}_discoveries_total", METRICS_PREFIX),
        Unit::Count,
        "Newly discovered papers, by direction"
    );

    describe_gauge!(
        format!("{}_frontier_pending", METRICS_PREFIX),
        Unit::Count,
        "Papers still waiting on the frontier"
    );

    // Upstream metrics
    describe_counter!(
        format!("{}_api_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed scholarly API calls, by endpoint"
    );

    describe_counter!(
        format!("{}_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Neighbor lookups that fell back to the generic paper endpoint"
    );

    describe_counter!(
        format!("{}_metadata_batch_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Metadata hydration batches skipped after a failure"
    );

    // Persistence metrics
    describe_counter!(
        format!("{}_flushes_total", METRICS_PREFIX),
        Unit::Count,
        "Buffer flushes (append + checkpoint)"
    );

    describe_counter!(
        format!("{}_records_written_total", METRICS_PREFIX),
        Unit::Count,
        "Discovery rows appended to the partial dataset"
    );
}

/// Record one expanded paper
pub fn record_paper_expanded() {
    counter!(format!("{}_papers_expanded_total", METRICS_PREFIX)).increment(1);
}

/// Record a new discovery in the given direction ("backward" / "forward")
pub fn record_discovery(direction: &'static str) {
    counter!(
        format!("{}_discoveries_total", METRICS_PREFIX),
        "direction" => direction
    )
    .increment(1);
}

/// Update the pending frontier size
pub fn set_frontier_pending(pending: usize) {
    gauge!(format!("{}_frontier_pending", METRICS_PREFIX)).set(pending as f64);
}

/// Record a failed API call
pub fn record_api_failure(endpoint: &'static str) {
    counter!(
        format!("{}_api_failures_total", METRICS_PREFIX),
        "endpoint" => endpoint
    )
    .increment(1);
}

/// Record a fallback to the generic paper lookup
pub fn record_fallback() {
    counter!(format!("{}_fallbacks_total", METRICS_PREFIX)).increment(1);
}

/// Record a skipped metadata batch
pub fn record_metadata_batch_failure() {
    counter!(format!("{}_metadata_batch_failures_total", METRICS_PREFIX)).increment(1);
}

/// Record a completed flush and the rows it wrote
pub fn record_flush(rows: usize) {
    counter!(format!("{}_flushes_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_records_written_total", METRICS_PREFIX)).increment(rows as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_metrics();
        record_paper_expanded();
        record_discovery("backward");
        record_api_failure("references");
        set_frontier_pending(3);
        record_flush(10);
    }
}
