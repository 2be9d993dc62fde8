//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to the native boundary: callback
//!   traffic, captured callback failures, open sessions and failed native calls.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Failure kinds reported by the callback adapter.
pub const CALLBACK_FAILURE_KINDS: [&str; 4] = ["error", "panic", "abort", "reentered"];

/// Prometheus-backed metrics registry shared by the interop wrappers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    callback_invocations_total: IntCounter,
    callback_failures_total: IntCounterVec,
    sessions_open: IntGauge,
    native_failures_total: IntCounterVec,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Total native-initiated callback invocations.
    pub callback_invocations_total: u64,
    /// Total callback failures captured at the native boundary, across kinds.
    pub callback_failures_total: u64,
    /// Sessions currently held by live wrappers.
    pub sessions_open: i64,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let callback_invocations_total = IntCounter::with_opts(Opts::new(
            "callback_invocations_total",
            "Status callbacks invoked by the native engine",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "callback_invocations_total",
            source,
        })?;
        let callback_failures_total = IntCounterVec::new(
            Opts::new(
                "callback_failures_total",
                "Status callback failures captured at the native boundary by kind",
            ),
            &["kind"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "callback_failures_total",
            source,
        })?;
        let sessions_open = IntGauge::with_opts(Opts::new(
            "sessions_open",
            "Native sessions currently owned by session wrappers",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "sessions_open",
            source,
        })?;
        let native_failures_total = IntCounterVec::new(
            Opts::new(
                "native_failures_total",
                "Native engine calls that returned an error status",
            ),
            &["operation"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "native_failures_total",
            source,
        })?;

        register(&registry, "callback_invocations_total", &callback_invocations_total)?;
        register(&registry, "callback_failures_total", &callback_failures_total)?;
        register(&registry, "sessions_open", &sessions_open)?;
        register(&registry, "native_failures_total", &native_failures_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                callback_invocations_total,
                callback_failures_total,
                sessions_open,
                native_failures_total,
            }),
        })
    }

    /// Increment the callback invocation counter.
    pub fn inc_callback_invocation(&self) {
        self.inner.callback_invocations_total.inc();
    }

    /// Increment the captured callback failure counter for the given kind.
    pub fn inc_callback_failure(&self, kind: &str) {
        self.inner
            .callback_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a session acquired by a wrapper.
    pub fn inc_sessions_open(&self) {
        self.inner.sessions_open.inc();
    }

    /// Record a session released by a wrapper.
    pub fn dec_sessions_open(&self) {
        self.inner.sessions_open.dec();
    }

    /// Increment the failed native call counter for the given operation.
    pub fn inc_native_failure(&self, operation: &str) {
        self.inner
            .native_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Count of failed native calls recorded for a single operation.
    #[must_use]
    pub fn native_failures(&self, operation: &str) -> u64 {
        self.inner
            .native_failures_total
            .with_label_values(&[operation])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let callback_failures_total = CALLBACK_FAILURE_KINDS
            .iter()
            .map(|kind| {
                self.inner
                    .callback_failures_total
                    .with_label_values(&[*kind])
                    .get()
            })
            .sum();
        MetricsSnapshot {
            callback_invocations_total: self.inner.callback_invocations_total.get(),
            callback_failures_total,
            sessions_open: self.inner.sessions_open.get(),
        }
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_callback_invocation();
        metrics.inc_callback_invocation();
        metrics.inc_callback_failure("error");
        metrics.inc_callback_failure("abort");
        metrics.inc_callback_failure("error");
        metrics.inc_sessions_open();
        metrics.inc_sessions_open();
        metrics.dec_sessions_open();
        metrics.inc_native_failure("end_session");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.callback_invocations_total, 2);
        assert_eq!(snapshot.callback_failures_total, 3);
        assert_eq!(snapshot.sessions_open, 1);
        assert_eq!(metrics.native_failures("end_session"), 1);
        assert_eq!(metrics.native_failures("begin_session"), 0);
        Ok(())
    }

    #[test]
    fn render_uses_text_exposition_format() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_callback_failure("panic");
        let rendered = metrics.render()?;
        assert!(rendered.contains("callback_failures_total{kind=\"panic\"} 1"));
        assert!(rendered.contains("sessions_open 0"));
        Ok(())
    }
}
