//! Metrics collection and exposition.
//!
//! # Metrics
//! - `app_tasks_started_total` (counter): supervised tasks launched
//! - `app_task_failures_total` (counter): supervised tasks that returned an error
//! - `app_http_requests_total` (counter): requests by method, status
//! - `app_http_request_duration_seconds` (histogram): latency distribution

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_task_started() {
    counter!("app_tasks_started_total").increment(1);
}

pub fn record_task_failure() {
    counter!("app_task_failures_total").increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("app_http_requests_total", "method" => method.to_string(), "status" => status.clone()).increment(1);
    histogram!("app_http_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// Middleware recording request count and latency.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), start);
    response
}
