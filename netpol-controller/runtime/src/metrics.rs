use prometheus_client::{
    metrics::{
        counter::Counter,
        gauge::Gauge,
        histogram::{exponential_buckets, Histogram},
    },
    registry::{Registry, Unit},
};
use std::time::Duration;

/// Describes synchronization passes.
#[derive(Clone, Debug)]
pub struct SyncMetrics {
    passes: Counter,
    failures: Counter,
    duration: Histogram,
    active_chains: Gauge,
}

// === impl SyncMetrics ===

impl SyncMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let passes = Counter::default();
        prom.register(
            "passes",
            "Count of completed synchronization passes",
            passes.clone(),
        );

        let failures = Counter::default();
        prom.register(
            "failures",
            "Count of synchronization passes that failed",
            failures.clone(),
        );

        // 1ms to ~16s.
        let duration = Histogram::new(exponential_buckets(0.001, 2.0, 15));
        prom.register_with_unit(
            "duration",
            "Time taken by synchronization passes",
            Unit::Seconds,
            duration.clone(),
        );

        let active_chains = Gauge::default();
        prom.register(
            "active_chains",
            "Number of pod chains in the latest successful generation",
            active_chains.clone(),
        );

        Self {
            passes,
            failures,
            duration,
            active_chains,
        }
    }

    pub(crate) fn succeeded(&self, elapsed: Duration, active_chains: usize) {
        self.passes.inc();
        self.duration.observe(elapsed.as_secs_f64());
        self.active_chains.set(active_chains as i64);
    }

    pub(crate) fn failed(&self, elapsed: Duration) {
        self.failures.inc();
        self.duration.observe(elapsed.as_secs_f64());
    }
}
