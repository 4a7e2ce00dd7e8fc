//! Metrics collection and Prometheus exporter for quota-gate.
//!
//! Counters cover the admission decision (accepted by quota status, rejected
//! by reason) and the soft-failure paths that never reach the caller:
//! identity fallbacks, store errors and lost quota writes.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Admitted requests, labelled by quota status (vip, disabled, unlimited, active).
pub const ADMISSIONS_ACCEPTED_TOTAL: &str = "quota_gate_admissions_accepted_total";
/// Rejected requests, labelled by reason.
pub const ADMISSIONS_REJECTED_TOTAL: &str = "quota_gate_admissions_rejected_total";
/// Admission decision latency histogram (seconds).
pub const ADMISSION_DURATION_SECONDS: &str = "quota_gate_admission_duration_seconds";
/// Identities resolved from claims because the store could not answer.
pub const IDENTITY_FALLBACK_TOTAL: &str = "quota_gate_identity_fallback_total";
/// Store operation failures, labelled by operation.
pub const STORE_ERRORS_TOTAL: &str = "quota_gate_store_errors_total";
/// Channel rate-limit rejections, labelled by axis.
pub const RATE_LIMIT_REJECTED_TOTAL: &str = "quota_gate_rate_limit_rejected_total";
/// Debits that were admitted but could not be persisted.
pub const QUOTA_WRITE_FAILURES_TOTAL: &str = "quota_gate_quota_write_failures_total";
/// Channel rate records currently held in memory.
pub const RATE_LIMIT_RECORDS: &str = "quota_gate_rate_limit_records";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an admitted request.
#[inline]
pub fn record_admission_accepted(status: &'static str) {
    counter!(ADMISSIONS_ACCEPTED_TOTAL, "status" => status).increment(1);
}

/// Record a rejected request.
#[inline]
pub fn record_admission_rejected(reason: &'static str) {
    counter!(ADMISSIONS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Record how long one admission decision took.
#[inline]
pub fn record_admission_duration(duration_secs: f64) {
    histogram!(ADMISSION_DURATION_SECONDS).record(duration_secs);
}

/// Record an identity built from claims only.
#[inline]
pub fn record_identity_fallback() {
    counter!(IDENTITY_FALLBACK_TOTAL).increment(1);
}

/// Record a store failure.
#[inline]
pub fn record_store_error(operation: &'static str, kind: &'static str) {
    counter!(STORE_ERRORS_TOTAL, "operation" => operation, "kind" => kind).increment(1);
}

/// Record a channel rate-limit rejection.
#[inline]
pub fn record_rate_limit_rejected(axis: &'static str) {
    counter!(RATE_LIMIT_REJECTED_TOTAL, "axis" => axis).increment(1);
}

/// Record a quota debit that was not persisted.
#[inline]
pub fn record_quota_write_failure() {
    counter!(QUOTA_WRITE_FAILURES_TOTAL).increment(1);
}

/// Set the number of live channel rate records.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn set_rate_limit_records(count: usize) {
    gauge!(RATE_LIMIT_RECORDS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        record_admission_accepted("active");
        record_admission_rejected("quota_exceeded");
        record_admission_duration(0.002);
        record_identity_fallback();
        record_store_error("quota_read", "timeout");
        record_rate_limit_rejected("per-minute");
        record_quota_write_failure();
        set_rate_limit_records(3);
    }

    #[test]
    fn test_invalid_listen_address() {
        assert!(init_prometheus("not-an-address").is_err());
    }

    #[test]
    fn test_metric_names_share_prefix() {
        for name in [
            ADMISSIONS_ACCEPTED_TOTAL,
            ADMISSIONS_REJECTED_TOTAL,
            ADMISSION_DURATION_SECONDS,
            IDENTITY_FALLBACK_TOTAL,
            STORE_ERRORS_TOTAL,
            RATE_LIMIT_REJECTED_TOTAL,
            QUOTA_WRITE_FAILURES_TOTAL,
            RATE_LIMIT_RECORDS,
        ] {
            assert!(name.starts_with("quota_gate_"), "{name}");
        }
    }
}
