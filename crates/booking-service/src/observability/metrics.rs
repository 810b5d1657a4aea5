//! Metrics definitions for the booking service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `booking_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: 2 values (success, error)
//! - `phase`: 6 values (allocation phases)
//! - `operation`: bounded by code (resolve, insert_slot, put_content, ...)
//! - `error_type`: bounded by `BookingError` variants

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return its handle for rendering.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("booking_meeting_creation".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set meeting creation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("booking_db_query".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Meeting Metrics
// ============================================================================

/// Record a meeting creation attempt.
///
/// Metric: `booking_meeting_creation_duration_seconds`, `booking_meeting_creations_total`
/// Labels: `status`, `phase` (phase reached; `done` on success)
pub fn record_meeting_creation(status: &str, phase: &str, duration: Duration) {
    histogram!("booking_meeting_creation_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("booking_meeting_creations_total", "status" => status.to_string(), "phase" => phase.to_string())
        .increment(1);
}

/// Record a rejected booking because an owner was busy or unavailable.
///
/// Metric: `booking_slot_conflicts_total`
/// Labels: `source` (precheck, storage, availability)
pub fn record_slot_conflict(source: &str) {
    counter!("booking_slot_conflicts_total", "source" => source.to_string()).increment(1);
}

/// Record a meeting cancellation.
///
/// Metric: `booking_meeting_cancellations_total`
/// Labels: `status`
pub fn record_meeting_cancellation(status: &str) {
    counter!("booking_meeting_cancellations_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Crypto Metrics
// ============================================================================

/// Record a failed unseal, decrypt or encrypt.
///
/// Metric: `booking_crypto_failures_total`
/// Labels: `operation`
pub fn record_crypto_failure(operation: &str) {
    counter!("booking_crypto_failures_total", "operation" => operation.to_string()).increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution.
///
/// Metric: `booking_db_query_duration_seconds`, `booking_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("booking_db_query_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());

    counter!("booking_db_queries_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an error returned to an HTTP caller.
///
/// Metric: `booking_errors_total`
/// Labels: `operation`, `error_type`, `status_code`
pub fn record_error(operation: &str, error_type: &str, status_code: u16) {
    counter!("booking_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}
