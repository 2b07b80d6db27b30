// Prometheus metrics for the StampPay gateway
// Tracks: request throughput, deposits, checkout outcomes

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_with_registry, register_histogram_with_registry, Counter, Encoder, Histogram,
    HistogramOpts, Opts, Registry, TextEncoder,
};

pub static METRICS: Lazy<Metrics> = Lazy::new(|| {
    Metrics::new().expect("Failed to initialize gateway metrics")
});

pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub http_requests_total: Counter,
    pub request_duration_seconds: Histogram,

    // Business metrics
    pub deposits_total: Counter,
    pub checkouts_total: Counter,
    pub checkouts_rejected_total: Counter,
    pub insufficient_funds_total: Counter,
    pub partial_commits_total: Counter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = register_counter_with_registry!(
            Opts::new("gateway_http_requests_total", "Total HTTP requests processed"),
            registry
        )?;

        let request_duration_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "gateway_request_duration_seconds",
                "HTTP request duration in seconds"
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            registry
        )?;

        let deposits_total = register_counter_with_registry!(
            Opts::new("gateway_deposits_total", "Successful account credits"),
            registry
        )?;

        let checkouts_total = register_counter_with_registry!(
            Opts::new("gateway_checkouts_total", "Successfully settled checkouts"),
            registry
        )?;

        let checkouts_rejected_total = register_counter_with_registry!(
            Opts::new(
                "gateway_checkouts_rejected_total",
                "Checkouts rejected before settlement"
            ),
            registry
        )?;

        let insufficient_funds_total = register_counter_with_registry!(
            Opts::new(
                "gateway_insufficient_funds_total",
                "Checkouts rejected by the balance check"
            ),
            registry
        )?;

        let partial_commits_total = register_counter_with_registry!(
            Opts::new(
                "gateway_partial_commits_total",
                "Settlements that debited but failed a later write"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            http_requests_total,
            request_duration_seconds,
            deposits_total,
            checkouts_total,
            checkouts_rejected_total,
            insufficient_funds_total,
            partial_commits_total,
        })
    }

    /// Export metrics in the Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_export() {
        METRICS.http_requests_total.inc();
        let text = METRICS.export().unwrap();
        assert!(text.contains("gateway_http_requests_total"));
    }
}
