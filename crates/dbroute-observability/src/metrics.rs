//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for dbroute:
//! - Routing decisions (by role and the rule that chose it)
//! - Connection attempts (by role and outcome)
//! - Exhausted retry budgets
//! - Connect latency histograms
//! - Configuration reloads

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector for dbroute
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Routing decisions, labelled with the chosen role and the reason
    pub routing_decisions_total: CounterVec,

    /// Individual connect attempts (outcome = success | failure | timeout)
    pub connect_attempts_total: CounterVec,
    /// Calls that ran out of attempts without a connection
    pub connect_exhausted_total: CounterVec,
    /// Duration of successful connect attempts
    pub connect_duration_seconds: HistogramVec,

    /// Configuration reloads (outcome = applied | rejected)
    pub config_reloads_total: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let routing_decisions_total = CounterVec::new(
            Opts::new(
                "dbroute_routing_decisions_total",
                "Total number of routing decisions",
            ),
            &["role", "reason"],
        )?;

        let connect_attempts_total = CounterVec::new(
            Opts::new(
                "dbroute_connect_attempts_total",
                "Total number of connection attempts",
            ),
            &["role", "outcome"],
        )?;

        let connect_exhausted_total = CounterVec::new(
            Opts::new(
                "dbroute_connect_exhausted_total",
                "Total number of calls that exhausted all connection attempts",
            ),
            &["role"],
        )?;

        let connect_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dbroute_connect_duration_seconds",
                "Time to establish a database connection",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["role"],
        )?;

        let config_reloads_total = CounterVec::new(
            Opts::new(
                "dbroute_config_reloads_total",
                "Total number of configuration reloads",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(routing_decisions_total.clone()))?;
        registry.register(Box::new(connect_attempts_total.clone()))?;
        registry.register(Box::new(connect_exhausted_total.clone()))?;
        registry.register(Box::new(connect_duration_seconds.clone()))?;
        registry.register(Box::new(config_reloads_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            routing_decisions_total,
            connect_attempts_total,
            connect_exhausted_total,
            connect_duration_seconds,
            config_reloads_total,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record which pool a routed operation was sent to and why
    pub fn record_routing_decision(&self, role: &str, reason: &str) {
        self.routing_decisions_total
            .with_label_values(&[role, reason])
            .inc();
    }

    /// Record a successful connect attempt
    pub fn record_connect_success(&self, role: &str, duration_secs: f64) {
        self.connect_attempts_total
            .with_label_values(&[role, "success"])
            .inc();
        self.connect_duration_seconds
            .with_label_values(&[role])
            .observe(duration_secs);
    }

    /// Record a failed connect attempt
    pub fn record_connect_failure(&self, role: &str, timed_out: bool) {
        let outcome = if timed_out { "timeout" } else { "failure" };
        self.connect_attempts_total
            .with_label_values(&[role, outcome])
            .inc();
    }

    /// Record a call that used up every attempt
    pub fn record_connect_exhausted(&self, role: &str) {
        self.connect_exhausted_total.with_label_values(&[role]).inc();
    }

    /// Record a configuration reload
    pub fn record_config_reload(&self, applied: bool) {
        let outcome = if applied { "applied" } else { "rejected" };
        self.config_reloads_total.with_label_values(&[outcome]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
