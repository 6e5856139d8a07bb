//! Prometheus metrics for social-service.
//!
//! Exposes feed and mutation collectors and an HTTP handler for the `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Duration of feed composition by ranking policy.
    pub static ref FEED_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "feed_request_duration_seconds",
        "Feed request duration segmented by ranking policy",
        &["policy"]
    )
    .expect("failed to register feed_request_duration_seconds");

    /// Items returned per feed page.
    pub static ref FEED_ITEMS_RETURNED: HistogramVec = register_histogram_vec!(
        "feed_items_returned",
        "Number of feed items returned segmented by ranking policy",
        &["policy"],
        vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .expect("failed to register feed_items_returned");

    /// Social mutations (like, repost, follow, content writes) by outcome.
    pub static ref SOCIAL_MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "social_mutations_total",
        "Social mutations segmented by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("failed to register social_mutations_total");

    /// FOLLOWING_POST fan-out deliveries by result.
    pub static ref NOTIFICATION_FANOUT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notification_fanout_total",
        "Follower fan-out notification deliveries segmented by result",
        &["result"]
    )
    .expect("failed to register notification_fanout_total");
}

pub fn record_mutation<T, E>(operation: &str, result: &Result<T, E>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    SOCIAL_MUTATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
