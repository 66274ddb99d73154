//! Prometheus metrics for retouch-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const COMMITS_TOTAL: &str = "retouch_history_commits_total";
const HISTORY_STEPS_TOTAL: &str = "retouch_history_steps_total";
const TRANSFORMS_TOTAL: &str = "retouch_transforms_total";
const UPLOADS_TOTAL: &str = "retouch_uploads_total";
const VALIDATION_FAILURES_TOTAL: &str = "retouch_validation_failures_total";
const SESSIONS_ACTIVE: &str = "retouch_sessions_active";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record new history entries.
///
/// * `source` - "stroke", "upload" or "transform"
pub fn record_commits(source: &'static str, count: u64) {
    counter!(COMMITS_TOTAL, "source" => source).increment(count);
}

/// Record an undo, redo or restore that moved the position.
pub fn record_history_step(direction: &'static str) {
    counter!(HISTORY_STEPS_TOTAL, "direction" => direction).increment(1);
}

/// Record a finished transform.
///
/// * `operation` - filter, resize, rotate, crop or save
/// * `outcome` - "applied", "saved", "discarded" or "failed"
pub fn record_transform(operation: &'static str, outcome: &'static str) {
    counter!(
        TRANSFORMS_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an image upload and whether the gateway holds a copy.
pub fn record_upload(remote: bool) {
    counter!(UPLOADS_TOTAL, "remote" => remote.to_string()).increment(1);
}

/// Record an input validation failure.
///
/// * `validation_type` - which check failed (upload, transform, tool, ...)
pub fn record_validation_failure(validation_type: &'static str) {
    counter!(VALIDATION_FAILURES_TOTAL, "type" => validation_type).increment(1);
}

/// Update the live session count.
#[allow(clippy::cast_precision_loss)]
pub fn set_sessions(count: usize) {
    gauge!(SESSIONS_ACTIVE).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: calls are no-ops and must not panic.
        record_commits("stroke", 2);
        record_history_step("undo");
        record_transform("filter", "applied");
        record_upload(false);
        record_validation_failure("upload");
        set_sessions(3);
    }
}
