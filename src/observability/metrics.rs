//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_operations_total` (counter): finished sagas by kind, outcome
//! - `relay_operation_errors_total` (counter): failures by kind, error category
//! - `relay_step_duration_seconds` (histogram): compose/sign/broadcast latency
//! - `relay_lock_wait_seconds` (histogram): time spent queued on an address lock
//! - `relay_address_locks` (gauge): size of the address lock table
//! - `relay_rpc_requests_total` (counter): JSON-RPC calls by method, outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the terminal state of a saga.
pub fn record_operation(kind: &'static str, outcome: &'static str) {
    counter!("relay_operations_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Record a saga failure by category.
pub fn record_operation_error(kind: &'static str, category: &'static str) {
    counter!("relay_operation_errors_total", "kind" => kind, "category" => category).increment(1);
}

/// Record how long a saga step took.
pub fn record_step(step: &'static str, start: Instant) {
    histogram!("relay_step_duration_seconds", "step" => step).record(start.elapsed().as_secs_f64());
}

/// Record time spent waiting for an address lock.
pub fn record_lock_wait(start: Instant) {
    histogram!("relay_lock_wait_seconds").record(start.elapsed().as_secs_f64());
}

/// Record the number of registered address locks.
pub fn record_lock_table_size(size: usize) {
    gauge!("relay_address_locks").set(size as f64);
}

/// Record a JSON-RPC call.
pub fn record_rpc(method: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("relay_rpc_requests_total", "method" => method.to_string(), "outcome" => outcome).increment(1);
}
