use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramVec, IntCounter, TextEncoder, histogram_opts, opts,
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter,
};

use std::sync::LazyLock;
use std::time::{Duration, Instant};

// Registration only fails on duplicate names, which these constants rule out.
static HTTP_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"]
    )
    .unwrap()
});

static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ]),
        &["method", "path"]
    )
    .unwrap()
});

static WEBSOCKET_CONNECTIONS_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(opts!(
        "websocket_connections_active",
        "Active WS connections"
    ))
    .unwrap()
});

static WEBSOCKET_FRAMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!("websocket_frames_total", "Total WebSocket text frames"),
        &["direction"]
    )
    .unwrap()
});

static CHAT_ENVELOPES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!("chat_envelopes_total", "Inbound envelopes handled"),
        &["envelope_type"]
    )
    .unwrap()
});

static CHAT_ENVELOPE_PROCESSING_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "chat_envelope_processing_duration_seconds",
            "Inbound envelope processing duration"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["envelope_type"]
    )
    .unwrap()
});

static CHAT_ENVELOPES_REJECTED: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!(
            "chat_envelopes_rejected_total",
            "Inbound envelopes ignored without effect"
        ),
        &["reason"]
    )
    .unwrap()
});

static CHAT_PERSISTENCE_FAILURES: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!(
            "chat_persistence_failures_total",
            "Store operations that failed while handling an envelope"
        ),
        &["operation"]
    )
    .unwrap()
});

static CHAT_SESSIONS_EVICTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(opts!(
        "chat_sessions_evicted_total",
        "Sessions closed because their outbound queue overflowed"
    ))
    .unwrap()
});

static CHAT_ROOMS_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(opts!("chat_rooms_active", "Rooms with live sessions")).unwrap()
});

static DB_QUERY_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "db_query_duration_seconds",
            "Duration of database queries in seconds"
        ),
        &["operation"]
    )
    .unwrap()
});

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // label by route template so usernames in paths don't explode cardinality
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
        .inc();

    HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), path.as_str()])
        .observe(duration.as_secs_f64());

    response
}

pub async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metrics, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub struct Metrics;

impl Metrics {
    // --- WebSocket ---
    pub fn websocket_connected() {
        WEBSOCKET_CONNECTIONS_ACTIVE.inc();
    }

    pub fn websocket_disconnected() {
        WEBSOCKET_CONNECTIONS_ACTIVE.dec();
    }

    pub fn websocket_frame_sent() {
        WEBSOCKET_FRAMES_TOTAL.with_label_values(&["sent"]).inc();
    }

    pub fn websocket_frame_received() {
        WEBSOCKET_FRAMES_TOTAL.with_label_values(&["received"]).inc();
    }

    // --- Chat ---
    pub fn envelope_processed(envelope_type: &str, duration: Duration) {
        CHAT_ENVELOPES_TOTAL
            .with_label_values(&[envelope_type])
            .inc();

        CHAT_ENVELOPE_PROCESSING_DURATION
            .with_label_values(&[envelope_type])
            .observe(duration.as_secs_f64());
    }

    pub fn envelope_rejected(reason: &str) {
        CHAT_ENVELOPES_REJECTED.with_label_values(&[reason]).inc();
    }

    pub fn persistence_failed(operation: &str) {
        CHAT_PERSISTENCE_FAILURES
            .with_label_values(&[operation])
            .inc();
    }

    pub fn session_evicted() {
        CHAT_SESSIONS_EVICTED.inc();
    }

    pub fn room_opened() {
        CHAT_ROOMS_ACTIVE.inc();
    }

    pub fn room_closed() {
        CHAT_ROOMS_ACTIVE.dec();
    }

    pub fn observe_db_query(operation: &str, duration: Duration) {
        DB_QUERY_DURATION_SECONDS
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }
}
