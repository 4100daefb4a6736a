//! # Prometheus Metrics
//!
//! Operational metrics for the vault factory. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `piggybank` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Prometheus handles are internally reference counted, so clones share
/// the same series.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Vaults created since startup.
    pub vaults_created_total: IntCounter,
    /// Successful deposits.
    pub deposits_total: IntCounter,
    /// Successful withdrawals.
    pub withdrawals_total: IntCounter,
    /// Refused operations, labelled by error kind.
    pub rejected_operations_total: IntCounterVec,
    /// Vaults in the registry.
    pub registered_vaults: IntGauge,
    /// Handler latency in seconds, labelled by operation.
    pub operation_latency_seconds: HistogramVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("piggybank".into()), None)
            .expect("failed to create prometheus registry");

        let vaults_created_total =
            IntCounter::new("vaults_created_total", "Total number of vaults created")
                .expect("metric creation");
        registry
            .register(Box::new(vaults_created_total.clone()))
            .expect("metric registration");

        let deposits_total = IntCounter::new("deposits_total", "Total number of accepted deposits")
            .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total =
            IntCounter::new("withdrawals_total", "Total number of completed withdrawals")
                .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Operations refused by the factory or a vault, by error kind",
            ),
            &["kind"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(rejected_operations_total.clone()))
            .expect("metric registration");

        let registered_vaults = IntGauge::new("registered_vaults", "Vaults in the registry")
            .expect("metric creation");
        registry
            .register(Box::new(registered_vaults.clone()))
            .expect("metric registration");

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Factory and vault operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
            &["operation"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            vaults_created_total,
            deposits_total,
            withdrawals_total,
            rejected_operations_total,
            registered_vaults,
            operation_latency_seconds,
        }
    }

    /// Counts one refused operation.
    pub fn record_rejection(&self, kind: &str) {
        self.rejected_operations_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
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
