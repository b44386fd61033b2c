//! Metrics recording for the `SQLite` store.

use std::time::Instant;

/// Records `storage_operations_total` and `storage_operation_duration_ms`
/// for one store operation.
///
/// `status` is `"success"` or `"error"`.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Returns the status label for a result.
pub const fn status_of<T>(result: &crate::Result<T>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}
