//! # Prometheus Metrics
//!
//! Operational metrics for the relay, scraped at `/metrics` on the metrics
//! port. Everything lives in a dedicated [`prometheus::Registry`] under the
//! `swan` prefix.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};
use url::Url;

use swan::swift::HttpGet;
use swan::{ErrorKind, Result as SwanResult};

#[derive(Clone)]
pub struct SwanMetrics {
    registry: Registry,
    /// Requests received, by route.
    pub requests_total: IntCounterVec,
    /// Errors returned to callers, by error kind.
    pub errors_total: IntCounterVec,
    /// Latency of calls to the access node, successful or not.
    pub upstream_latency_seconds: Histogram,
}

impl SwanMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("swan".into()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Requests received by route"),
            &["route"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Error responses by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let upstream_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "upstream_latency_seconds",
                "Latency of access node calls in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(upstream_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            upstream_latency_seconds,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.requests_total.with_label_values(&[route]).inc();
    }

    pub fn record_error(&self, kind: ErrorKind) {
        self.errors_total.with_label_values(&[kind.as_str()]).inc();
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<SwanMetrics>;

/// Renders `/metrics`.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Metered Transport
// ---------------------------------------------------------------------------

/// Wraps an [`HttpGet`] and records every call in
/// `upstream_latency_seconds`.
pub struct MeteredTransport {
    inner: Arc<dyn HttpGet>,
    metrics: SharedMetrics,
}

impl MeteredTransport {
    pub fn new(inner: Arc<dyn HttpGet>, metrics: SharedMetrics) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl HttpGet for MeteredTransport {
    async fn get(&self, url: &Url) -> SwanResult<Bytes> {
        let started = Instant::now();
        let result = self.inner.get(url).await;
        self.metrics
            .upstream_latency_seconds
            .observe(started.elapsed().as_secs_f64());
        result
    }
}
