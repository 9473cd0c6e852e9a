//! Request metrics for the REST surface, served as prometheus text on
//! `GET /metrics`.

use std::time::Instant;

use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};
use tracing::error;

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "suitale_http_requests_total",
        "Total HTTP requests by method, path and status",
        &["method", "path", "status"]
    )
    .expect("metric can be registered")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "suitale_http_request_duration_seconds",
        "HTTP request duration by method and path",
        &["method", "path"]
    )
    .expect("metric can be registered")
});

/// Collapse parameterized paths so metrics stay low-cardinality
fn metrics_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.len() >= 4 && segments[1] == "api" && segments[2] == "tales" {
        // /api/tales/{id} and /api/tales/{id}/full carry row ids
        match segments[3] {
            "initiate-publication" | "record-publication" | "record-batch-publication"
            | "upload" => {}
            _ => segments[3] = "{id}",
        }
    }
    segments.join("/")
}

/// axum middleware recording counts and durations per request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = metrics_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Serve the default registry as prometheus text
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_ids_are_collapsed() {
        assert_eq!(metrics_path("/api/tales/abc-123"), "/api/tales/{id}");
        assert_eq!(
            metrics_path("/api/tales/abc-123/full"),
            "/api/tales/{id}/full"
        );
        assert_eq!(
            metrics_path("/api/tales/initiate-publication"),
            "/api/tales/initiate-publication"
        );
        assert_eq!(metrics_path("/api/tales"), "/api/tales");
        assert_eq!(metrics_path("/metrics"), "/metrics");
    }
}
