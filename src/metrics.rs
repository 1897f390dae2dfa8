//! Prometheus metrics for latency tracking and monitoring.
//!
//! This module provides metrics for:
//! - Poll tick latency and skipped ticks
//! - Per-venue read latency and failures
//! - Identifier resolutions and slot transitions
//! - Opportunities, executed legs and order outcomes

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

use crate::market::Venue;

// === Metric Name Constants ===

/// Full poll tick latency metric name.
pub const METRIC_TICK_LATENCY: &str = "poll_tick_latency_ms";
/// Venue read latency metric name.
pub const METRIC_VENUE_READ_LATENCY: &str = "venue_read_latency_ms";
/// Order submission latency metric name.
pub const METRIC_ORDER_SUBMIT_LATENCY: &str = "order_submit_latency_ms";
/// Ticks skipped because the previous one was still running.
pub const METRIC_TICKS_SKIPPED: &str = "poll_ticks_skipped_total";
/// Venue read failures counter metric name.
pub const METRIC_VENUE_READ_FAILURES: &str = "venue_read_failures_total";
/// Identifier resolutions counter metric name.
pub const METRIC_IDENTIFIER_RESOLUTIONS: &str = "identifier_resolutions_total";
/// Slot transitions counter metric name.
pub const METRIC_SLOT_TRANSITIONS: &str = "slot_transitions_total";
/// Process handoffs counter metric name.
pub const METRIC_HANDOFFS: &str = "process_handoffs_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Legs executed counter metric name.
pub const METRIC_LEGS_EXECUTED: &str = "legs_executed_total";
/// Duplicate (already executed) detections counter metric name.
pub const METRIC_DUPLICATES_SUPPRESSED: &str = "duplicate_opportunities_total";
/// Orders submitted counter metric name.
pub const METRIC_ORDERS_SUBMITTED: &str = "orders_submitted_total";
/// Orders failed counter metric name.
pub const METRIC_ORDERS_FAILED: &str = "orders_failed_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_TICK_LATENCY,
        "Full poll tick latency (fetch, decide, log) in milliseconds"
    );
    describe_histogram!(
        METRIC_VENUE_READ_LATENCY,
        "Single venue price read latency in milliseconds"
    );
    describe_histogram!(
        METRIC_ORDER_SUBMIT_LATENCY,
        "Order submission latency in milliseconds"
    );

    // Counters
    describe_counter!(
        METRIC_TICKS_SKIPPED,
        "Ticks skipped because a previous tick was still in flight"
    );
    describe_counter!(METRIC_VENUE_READ_FAILURES, "Venue reads that returned no quote");
    describe_counter!(
        METRIC_IDENTIFIER_RESOLUTIONS,
        "Polymarket identifier resolutions (cache misses)"
    );
    describe_counter!(METRIC_SLOT_TRANSITIONS, "Observed 15-minute slot changes");
    describe_counter!(METRIC_HANDOFFS, "Replacement processes launched");
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of in-band leg sums detected"
    );
    describe_counter!(METRIC_LEGS_EXECUTED, "Arbitrage legs marked and dispatched");
    describe_counter!(
        METRIC_DUPLICATES_SUPPRESSED,
        "Qualifying legs skipped because they were already executed"
    );
    describe_counter!(METRIC_ORDERS_SUBMITTED, "Total number of orders submitted");
    describe_counter!(METRIC_ORDERS_FAILED, "Total number of orders that failed");

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder and return its render handle.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Record a single venue read latency.
pub fn record_venue_read_latency(start: Instant, venue: Venue) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_VENUE_READ_LATENCY, "venue" => venue.to_string()).record(latency_ms);
}

/// Record order submission latency.
pub fn record_order_submit_latency(start: Instant, venue: Venue) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_ORDER_SUBMIT_LATENCY, "venue" => venue.to_string()).record(latency_ms);
}

/// Increment skipped ticks counter.
pub fn inc_ticks_skipped() {
    counter!(METRIC_TICKS_SKIPPED).increment(1);
}

/// Increment venue read failures counter.
pub fn inc_venue_read_failures(venue: Venue) {
    counter!(METRIC_VENUE_READ_FAILURES, "venue" => venue.to_string()).increment(1);
}

/// Increment identifier resolutions counter.
pub fn inc_identifier_resolutions() {
    counter!(METRIC_IDENTIFIER_RESOLUTIONS).increment(1);
}

/// Increment slot transitions counter.
pub fn inc_slot_transitions() {
    counter!(METRIC_SLOT_TRANSITIONS).increment(1);
}

/// Increment handoffs counter.
pub fn inc_handoffs() {
    counter!(METRIC_HANDOFFS).increment(1);
}

/// Increment opportunities detected counter.
pub fn inc_opportunities_detected() {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(1);
}

/// Increment legs executed counter.
pub fn inc_legs_executed(leg: &'static str) {
    counter!(METRIC_LEGS_EXECUTED, "leg" => leg).increment(1);
}

/// Increment duplicate detections counter.
pub fn inc_duplicates_suppressed() {
    counter!(METRIC_DUPLICATES_SUPPRESSED).increment(1);
}

/// Increment orders submitted counter.
pub fn inc_orders_submitted(venue: Venue) {
    counter!(METRIC_ORDERS_SUBMITTED, "venue" => venue.to_string()).increment(1);
}

/// Increment orders failed counter.
pub fn inc_orders_failed(venue: Venue) {
    counter!(METRIC_ORDERS_FAILED, "venue" => venue.to_string()).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a poll tick.
pub fn timer_tick() -> LatencyTimer {
    LatencyTimer::new(METRIC_TICK_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 9.0); // Allow some tolerance
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_venue_read_latency(Instant::now(), Venue::Kalshi);
        inc_legs_executed("leg1");
        inc_orders_failed(Venue::Polymarket);
    }
}
