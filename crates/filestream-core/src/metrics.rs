//! Prometheus metrics helpers for the filestream handler.
//!
//! # Usage
//!
//! ```rust,ignore
//! use filestream_core::metrics::{init_metrics, start_metrics_server};
//!
//! let handle = init_metrics();
//! start_metrics_server(9091, handle).await?;
//!
//! metrics::counter!("streaming_duplicates_total").increment(1);
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `streaming_` for the per-file pipeline
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: only `outcome`, which is bounded to two values

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Files that reached a terminal outcome (label: `outcome` = success|failure).
pub const FILES_TOTAL: &str = "streaming_files_total";

/// Repeat deliveries recorded against an existing ledger entry.
pub const DUPLICATES_TOTAL: &str = "streaming_duplicates_total";

/// Wall time of the Ingestor (fetch + parse + insert).
pub const INGEST_SECONDS: &str = "streaming_ingest_seconds";

/// Sink insert attempts that were retried after a transient error.
pub const SINK_RETRIES_TOTAL: &str = "streaming_sink_retries_total";

/// Install the Prometheus recorder.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

/// Serve `/metrics` on the given port in a background task.
///
/// The listener is bound before returning so a port conflict surfaces here
/// rather than inside the spawned task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

fn register_metrics() {
    describe_counter!(
        FILES_TOTAL,
        "Files that reached a terminal outcome (label: outcome)"
    );
    describe_counter!(
        DUPLICATES_TOTAL,
        "Repeat deliveries of files that already have a ledger record"
    );
    describe_histogram!(
        INGEST_SECONDS,
        "Time spent fetching, parsing, and inserting one file"
    );
    describe_counter!(
        SINK_RETRIES_TOTAL,
        "Sink insert attempts retried after a transient error"
    );
}

/// Count one terminal outcome.
#[inline]
pub fn record_outcome(status: crate::Status) {
    metrics::counter!(FILES_TOTAL, "outcome" => status.as_str()).increment(1);
}
