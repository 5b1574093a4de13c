//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `payout_records_generated_total` - Records inserted by the generator
//! - `payout_claims_total` - Records claimed (`Pending -> Claimed`)
//! - `payout_claim_conflicts_total` - Claims lost to another actor
//! - `payout_broadcasts_total` - Transfers accepted by the ledger
//! - `payout_confirmations_total` - Records confirmed
//! - `payout_record_failures_total` - Records left `Claimed` after an error
//! - `payout_iterations_aborted_total` - Iterations stopped before touching records
//! - `payout_confirmation_wait_seconds` - Broadcast to confirmation latency

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Records inserted by the generator
    pub records_generated: IntCounter,

    /// Successful claims
    pub claims: IntCounter,

    /// Claims lost to another actor
    pub claim_conflicts: IntCounter,

    /// Broadcast transfers
    pub broadcasts: IntCounter,

    /// Confirmed records
    pub confirmations: IntCounter,

    /// Records that failed after claim
    pub record_failures: IntCounter,

    /// Iterations aborted by a safety check
    pub iterations_aborted: IntCounter,

    /// Confirmation wait histogram
    pub confirmation_wait: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("claims", &self.claims.get())
            .field("confirmations", &self.confirmations.get())
            .field("record_failures", &self.record_failures.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let records_generated = counter(
            "payout_records_generated_total",
            "Records inserted by the generator",
        )?;
        let claims = counter("payout_claims_total", "Records claimed")?;
        let claim_conflicts = counter(
            "payout_claim_conflicts_total",
            "Claims lost to another actor",
        )?;
        let broadcasts = counter("payout_broadcasts_total", "Transfers broadcast")?;
        let confirmations = counter("payout_confirmations_total", "Records confirmed")?;
        let record_failures = counter(
            "payout_record_failures_total",
            "Records left claimed after an error",
        )?;
        let iterations_aborted = counter(
            "payout_iterations_aborted_total",
            "Processing iterations aborted before touching records",
        )?;

        let confirmation_wait = Histogram::with_opts(
            HistogramOpts::new(
                "payout_confirmation_wait_seconds",
                "Broadcast to confirmation latency",
            )
            .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 2400.0, 3600.0]),
        )?;
        registry.register(Box::new(confirmation_wait.clone()))?;

        Ok(Self {
            records_generated,
            claims,
            claim_conflicts,
            broadcasts,
            confirmations,
            record_failures,
            iterations_aborted,
            confirmation_wait,
            registry,
        })
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("metric names are static and unique")
    }
}
