//! Prometheus metrics for the HR assistant.
//!
//! Exposes:
//! - `hr_assistant_command_duration_seconds` (histogram)
//! - `hr_assistant_command_total` (counter with status)
//! - `hr_assistant_command_inflight` (gauge)
//! - `hr_assistant_query_duration_seconds` (histogram by route)
//! - `hr_assistant_query_total` (counter by route and status)
//! - `hr_assistant_ws_connections` (gauge)
//! - `hr_assistant_ingested_chunks_total` (counter)
//! - `hr_assistant_memory_ops_total` (counter by op)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "hr_assistant_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hr_assistant_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "hr_assistant_command_inflight",
        "Number of in-flight commands",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 25ms up to ~1.5 minutes; queries include LLM calls.
    let buckets =
        prometheus::exponential_buckets(0.025, 2.0, 12).expect("failed to create query buckets");
    register_histogram_vec!(
        "hr_assistant_query_duration_seconds",
        "Agent query duration in seconds by route",
        &["route"],
        buckets
    )
    .expect("failed to register query duration histogram")
});

static QUERY_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hr_assistant_query_total",
        "Total agent queries by route and status",
        &["route", "status"]
    )
    .expect("failed to register query counter")
});

static WS_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "hr_assistant_ws_connections",
        "Number of open websocket connections"
    )
    .expect("failed to register websocket gauge")
});

static INGESTED_CHUNKS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "hr_assistant_ingested_chunks_total",
        "Total chunks indexed into the knowledge store"
    )
    .expect("failed to register ingested chunks counter")
});

static MEMORY_OPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "hr_assistant_memory_ops_total",
        "Total memory store operations by op",
        &["op"]
    )
    .expect("failed to register memory ops counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&QUERY_DURATION);
    Lazy::force(&QUERY_TOTAL);
    Lazy::force(&WS_CONNECTIONS);
    Lazy::force(&INGESTED_CHUNKS);
    Lazy::force(&MEMORY_OPS);
}

/// Increment inflight gauge for a command.
pub fn record_command_start(command: &'static str) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).dec();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .inc();
}

/// Record an agent query with its routed behavior and outcome.
pub fn record_query(route: &str, duration: Duration, success: bool) {
    init_collectors();
    QUERY_DURATION
        .with_label_values(&[route])
        .observe(duration.as_secs_f64());
    QUERY_TOTAL
        .with_label_values(&[route, if success { "ok" } else { "error" }])
        .inc();
}

/// Track an opened websocket connection.
pub fn ws_connection_opened() {
    init_collectors();
    WS_CONNECTIONS.inc();
}

/// Track a closed websocket connection.
pub fn ws_connection_closed() {
    init_collectors();
    WS_CONNECTIONS.dec();
}

/// Count chunks indexed into the knowledge store.
pub fn record_ingested_chunks(count: usize) {
    init_collectors();
    INGESTED_CHUNKS.inc_by(count as u64);
}

/// Count a memory store operation (`store`, `search`, `list`).
pub fn record_memory_op(op: &str) {
    init_collectors();
    MEMORY_OPS.with_label_values(&[op]).inc();
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Full::from("encode error"))
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, encoder.format_type())
        .body(Full::from(buffer))
        .unwrap())
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap()),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
