//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_credits_total` - Successful account credits
//! - `ledger_debits_total` - Successful account debits
//! - `ledger_insufficient_funds_total` - Debits rejected by the balance check
//! - `ledger_mutation_duration_seconds` - Histogram of mutation latencies

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful credits
    pub credits_total: IntCounter,

    /// Successful debits
    pub debits_total: IntCounter,

    /// Debits rejected for insufficient funds
    pub insufficient_funds_total: IntCounter,

    /// Mutation duration histogram
    pub mutation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let credits_total = register_int_counter_with_registry!(
            Opts::new("ledger_credits_total", "Successful account credits"),
            registry
        )?;

        let debits_total = register_int_counter_with_registry!(
            Opts::new("ledger_debits_total", "Successful account debits"),
            registry
        )?;

        let insufficient_funds_total = register_int_counter_with_registry!(
            Opts::new(
                "ledger_insufficient_funds_total",
                "Debits rejected by the balance check"
            ),
            registry
        )?;

        let mutation_duration = register_histogram_with_registry!(
            HistogramOpts::new(
                "ledger_mutation_duration_seconds",
                "Histogram of mutation latencies"
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
            registry
        )?;

        Ok(Self {
            credits_total,
            debits_total,
            insufficient_funds_total,
            mutation_duration,
            registry,
        })
    }

    /// Record a successful credit
    pub fn record_credit(&self) {
        self.credits_total.inc();
    }

    /// Record a successful debit
    pub fn record_debit(&self) {
        self.debits_total.inc();
    }

    /// Record a rejected debit
    pub fn record_insufficient_funds(&self) {
        self.insufficient_funds_total.inc();
    }

    /// Record mutation duration
    pub fn record_mutation_duration(&self, duration_seconds: f64) {
        self.mutation_duration.observe(duration_seconds);
    }

    /// Export metrics in the Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
