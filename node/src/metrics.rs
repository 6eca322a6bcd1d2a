//! # Prometheus Metrics
//!
//! Operational metrics for the devnet node, scraped at `/metrics` on the
//! metrics port. Everything lives in a dedicated [`prometheus::Registry`]
//! with the `twinvault` prefix.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// All metric handles for the node. Prometheus handles are reference
/// counted, so clones share the same series.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Committed deposits.
    pub deposits_total: IntCounter,
    /// Committed withdrawals.
    pub withdrawals_total: IntCounter,
    /// Rejected vault calls, labelled by error kind.
    pub rejected_calls_total: IntCounterVec,
    /// Deposits currently held.
    pub active_deposits: IntGauge,
    /// Current devnet block number.
    pub block_number: IntGauge,
    /// Wall-clock latency of vault entry points.
    pub call_latency_seconds: Histogram,
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("twinvault".into()), None)?;

        let deposits_total =
            IntCounter::new("deposits_total", "Total number of committed deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("withdrawals_total", "Total number of committed withdrawals")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let rejected_calls_total = IntCounterVec::new(
            Opts::new(
                "rejected_calls_total",
                "Vault calls rejected, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(rejected_calls_total.clone()))?;

        let active_deposits =
            IntGauge::new("active_deposits", "Deposits created and not yet withdrawn")?;
        registry.register(Box::new(active_deposits.clone()))?;

        let block_number = IntGauge::new("block_number", "Current devnet block number")?;
        registry.register(Box::new(block_number.clone()))?;

        let call_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "call_latency_seconds",
                "Latency of vault deposit/withdraw calls in seconds",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            deposits_total,
            withdrawals_total,
            rejected_calls_total,
            active_deposits,
            block_number,
            call_latency_seconds,
        })
    }

    /// Counts a rejected call under its error kind.
    pub fn record_rejection(&self, kind: &str) {
        self.rejected_calls_total.with_label_values(&[kind]).inc();
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

/// Shared metrics handle passed to axum handlers.
pub type SharedMetrics = Arc<VaultMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_output_is_prefixed() {
        let metrics = VaultMetrics::new().unwrap();
        metrics.deposits_total.inc();
        metrics.record_rejection("ReentrantCall");

        let text = metrics.encode().unwrap();
        assert!(text.contains("twinvault_deposits_total 1"));
        assert!(text.contains("twinvault_rejected_calls_total{kind=\"ReentrantCall\"} 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = VaultMetrics::new().unwrap();
        let b = VaultMetrics::new().unwrap();
        a.withdrawals_total.inc();
        assert_eq!(b.withdrawals_total.get(), 0);
    }
}
