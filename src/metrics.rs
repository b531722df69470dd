//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Process-wide mint metrics
pub struct Metrics {
    registry: Registry,

    // Counters
    pub mint_attempts: IntCounter,
    pub batch_verdicts: IntCounterVec,
    pub dispatch_accepted: IntCounter,
    pub dispatch_rejected: IntCounter,
    pub confirmations: IntCounterVec,
    pub assets_resolved: IntCounter,
    pub assets_dropped: IntCounter,
    pub eligibility_refreshes: IntCounter,

    // Gauges
    pub active_mints: IntGauge,

    // Histograms
    pub build_latency: Histogram,
    pub dispatch_latency: Histogram,
    pub confirmation_latency: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let mint_attempts = IntCounter::with_opts(Opts::new(
            "mint_attempts_total",
            "Mint attempts started by the user",
        ))?;

        let batch_verdicts = IntCounterVec::new(
            Opts::new("mint_batch_verdicts_total", "Mint batches by verdict"),
            &["verdict"],
        )?;

        let dispatch_accepted = IntCounter::with_opts(Opts::new(
            "mint_dispatch_accepted_total",
            "Mint transactions accepted by the network",
        ))?;

        let dispatch_rejected = IntCounter::with_opts(Opts::new(
            "mint_dispatch_rejected_total",
            "Mint transactions rejected at dispatch",
        ))?;

        let confirmations = IntCounterVec::new(
            Opts::new(
                "mint_confirmations_total",
                "Accepted signatures by terminal confirmation status",
            ),
            &["status"],
        )?;

        let assets_resolved = IntCounter::with_opts(Opts::new(
            "mint_assets_resolved_total",
            "Minted assets whose record and metadata resolved",
        ))?;

        let assets_dropped = IntCounter::with_opts(Opts::new(
            "mint_assets_dropped_total",
            "Confirmed assets dropped after a failed fetch",
        ))?;

        let eligibility_refreshes = IntCounter::with_opts(Opts::new(
            "eligibility_refreshes_total",
            "Eligibility re-evaluations",
        ))?;

        let active_mints = IntGauge::with_opts(Opts::new(
            "mint_active",
            "Mint attempts currently in flight",
        ))?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("mint_build_latency_seconds", "Batch construction latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;

        let dispatch_latency = Histogram::with_opts(
            HistogramOpts::new(
                "mint_dispatch_latency_seconds",
                "Time for every dispatch of a batch to settle",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "mint_confirmation_latency_seconds",
                "Time until every signature of a batch is terminal",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 90.0]),
        )?;

        registry.register(Box::new(mint_attempts.clone()))?;
        registry.register(Box::new(batch_verdicts.clone()))?;
        registry.register(Box::new(dispatch_accepted.clone()))?;
        registry.register(Box::new(dispatch_rejected.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(assets_resolved.clone()))?;
        registry.register(Box::new(assets_dropped.clone()))?;
        registry.register(Box::new(eligibility_refreshes.clone()))?;
        registry.register(Box::new(active_mints.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(dispatch_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            mint_attempts,
            batch_verdicts,
            dispatch_accepted,
            dispatch_rejected,
            confirmations,
            assets_resolved,
            assets_dropped,
            eligibility_refreshes,
            active_mints,
            build_latency,
            dispatch_latency,
            confirmation_latency,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn gather_text(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_text_lists_mint_metrics() {
        let m = Metrics::new().unwrap();
        m.mint_attempts.inc();
        m.batch_verdicts.with_label_values(&["partial_success"]).inc();

        let text = m.gather_text();
        assert!(text.contains("mint_attempts_total 1"));
        assert!(text.contains("verdict=\"partial_success\""));
    }
}
