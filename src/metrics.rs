//! Prometheus metrics for probe outcomes and latency.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

use crate::probe::ProbeName;

// === Metric Name Constants ===

/// Probe invocations counter metric name.
pub const METRIC_PROBE_INVOCATIONS: &str = "probe_invocations_total";
/// Probe latency metric name.
pub const METRIC_PROBE_LATENCY: &str = "probe_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_PROBE_INVOCATIONS,
        "Total number of probe invocations by probe and outcome"
    );
    describe_histogram!(
        METRIC_PROBE_LATENCY,
        "Probe latency in milliseconds, storage round trips included"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and return a handle for rendering.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Count one probe invocation.
pub fn record_probe_outcome(probe: ProbeName, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        METRIC_PROBE_INVOCATIONS,
        "probe" => probe.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    probe: ProbeName,
}

impl LatencyTimer {
    /// Create a new latency timer for the given probe.
    pub fn new(probe: ProbeName) -> Self {
        Self {
            start: Instant::now(),
            probe,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(METRIC_PROBE_LATENCY, "probe" => self.probe.to_string())
            .record(self.elapsed_ms());
    }
}

/// Create a latency timer for a probe.
pub fn timer_probe(probe: ProbeName) -> LatencyTimer {
    LatencyTimer::new(probe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = timer_probe(ProbeName::CosmosdbTestGet);
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }
}
