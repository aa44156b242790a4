//! # Execution Metrics
//!
//! Prometheus counters for the execution engine, registered in a dedicated
//! [`prometheus::Registry`] (prefix `meridian`) owned by each client, so two
//! clients in one process never collide.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::ErrorKind;

/// Metric handles for one client. Cloning shares the underlying series.
#[derive(Clone)]
pub struct ExecutionMetrics {
    registry: Registry,
    /// Logical requests started, by request type.
    pub requests_total: IntCounterVec,
    /// Dispatches to a node, by request type.
    pub attempts_total: IntCounterVec,
    /// Same-node retries after a retriable status.
    pub retries_total: IntCounter,
    /// Switches to a different node after a transport failure.
    pub node_rotations_total: IntCounter,
    /// Requests that ended in error, by error kind.
    pub failures_total: IntCounterVec,
    /// Round-trip time of single dispatches.
    pub attempt_latency_seconds: Histogram,
}

impl ExecutionMetrics {
    /// Creates and registers every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("meridian".into()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Logical requests started"),
            &["request"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let attempts_total = IntCounterVec::new(
            Opts::new("attempts_total", "Dispatches sent to nodes"),
            &["request"],
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let retries_total = IntCounter::new("retries_total", "Same-node retries after a retriable status")?;
        registry.register(Box::new(retries_total.clone()))?;

        let node_rotations_total = IntCounter::new(
            "node_rotations_total",
            "Switches to another node after a transport failure",
        )?;
        registry.register(Box::new(node_rotations_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new("failures_total", "Requests that ended in error"),
            &["kind"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        let attempt_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("attempt_latency_seconds", "Single dispatch round-trip time in seconds")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(attempt_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            attempts_total,
            retries_total,
            node_rotations_total,
            failures_total,
            attempt_latency_seconds,
        })
    }

    pub(crate) fn record_failure(&self, kind: ErrorKind) {
        self.failures_total.with_label_values(&[kind_label(kind)]).inc();
    }

    /// Prometheus text exposition of every metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for ExecutionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionMetrics").finish_non_exhaustive()
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Configuration => "configuration",
        ErrorKind::Transport => "transport",
        ErrorKind::Precheck => "precheck",
        ErrorKind::ReceiptStatus => "receipt_status",
        ErrorKind::Timeout => "timeout",
        ErrorKind::Cancelled => "cancelled",
        ErrorKind::Internal => "internal",
    }
}
