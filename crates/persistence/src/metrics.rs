//! Store metrics collection.

use metrics::{gauge, histogram};
use std::time::Instant;

/// Record store operation duration.
pub fn record_operation_duration(operation_name: &str, duration_secs: f64) {
    histogram!(
        "store_operation_duration_seconds",
        "operation" => operation_name.to_string()
    )
    .record(duration_secs);
}

/// Record the number of records held per collection.
pub fn record_collection_size(collection: &'static str, size: usize) {
    gauge!("store_collection_records", "collection" => collection).set(size as f64);
}

/// A helper to time store operations and record metrics.
///
/// Usage:
/// ```ignore
/// let timer = OperationTimer::new("insert_incident");
/// let result = do_the_work().await;
/// timer.record();
/// result
/// ```
pub struct OperationTimer {
    operation_name: &'static str,
    start: Instant,
}

impl OperationTimer {
    /// Create a new timer for the given operation name.
    pub fn new(operation_name: &'static str) -> Self {
        Self {
            operation_name,
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration to metrics.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_operation_duration(self.operation_name, duration);
    }
}
