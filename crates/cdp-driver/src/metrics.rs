//! Driver metrics.
//!
//! One `DriverMetrics` instance bundles the Prometheus collectors with plain
//! atomic totals, so tests can assert on a numeric snapshot without standing
//! up a registry. The process-wide instance is reached through `global()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use tracing::warn;

/// Numeric view of the counters, for assertions and debugging.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverMetricsSnapshot {
    pub commands: u64,
    pub command_failures: u64,
    pub command_latency_total_us: u64,
    pub events: u64,
    pub wait_timeouts: u64,
    pub resolutions: u64,
}

#[derive(Default)]
struct Totals {
    commands: AtomicU64,
    command_failures: AtomicU64,
    command_latency_us: AtomicU64,
    events: AtomicU64,
    wait_timeouts: AtomicU64,
    resolutions: AtomicU64,
}

pub struct DriverMetrics {
    commands: IntCounterVec,
    command_failures: IntCounterVec,
    command_latency: HistogramVec,
    events: IntCounter,
    wait_timeouts: IntCounter,
    resolutions: IntCounterVec,
    totals: Totals,
}

impl DriverMetrics {
    fn new() -> Self {
        Self {
            commands: IntCounterVec::new(
                Opts::new("pagehand_cdp_commands_total", "CDP commands issued"),
                &["method"],
            )
            .unwrap(),
            command_failures: IntCounterVec::new(
                Opts::new(
                    "pagehand_cdp_command_failures_total",
                    "CDP commands that returned an error",
                ),
                &["method"],
            )
            .unwrap(),
            command_latency: HistogramVec::new(
                histogram_opts!(
                    "pagehand_cdp_command_duration_seconds",
                    "CDP command latency",
                    vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
                ),
                &["method"],
            )
            .unwrap(),
            events: IntCounter::new("pagehand_cdp_events_total", "CDP events observed").unwrap(),
            wait_timeouts: IntCounter::new(
                "pagehand_wait_timeouts_total",
                "Wait loops that expired without a match",
            )
            .unwrap(),
            resolutions: IntCounterVec::new(
                Opts::new(
                    "pagehand_resolutions_total",
                    "Selector resolutions completed",
                ),
                &["engine"],
            )
            .unwrap(),
            totals: Totals::default(),
        }
    }

    pub fn register_on(&self, registry: &Registry) {
        let collectors: [Box<dyn Collector>; 6] = [
            Box::new(self.commands.clone()),
            Box::new(self.command_failures.clone()),
            Box::new(self.command_latency.clone()),
            Box::new(self.events.clone()),
            Box::new(self.wait_timeouts.clone()),
            Box::new(self.resolutions.clone()),
        ];
        for collector in collectors {
            if let Err(err) = registry.register(collector) {
                if !matches!(err, prometheus::Error::AlreadyReg) {
                    warn!(target: "cdp-driver", ?err, "metric registration failed");
                }
            }
        }
    }

    pub fn record_command(&self, method: &str) {
        self.totals.commands.fetch_add(1, Ordering::Relaxed);
        self.commands.with_label_values(&[method]).inc();
    }

    /// Record how a command ended. Latency is only meaningful for commands
    /// that got an answer, so it is tracked on the success path.
    pub fn record_command_outcome(&self, method: &str, elapsed: Duration, ok: bool) {
        if ok {
            let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
            self.totals
                .command_latency_us
                .fetch_add(micros, Ordering::Relaxed);
            self.command_latency
                .with_label_values(&[method])
                .observe(elapsed.as_secs_f64());
        } else {
            self.totals.command_failures.fetch_add(1, Ordering::Relaxed);
            self.command_failures.with_label_values(&[method]).inc();
        }
    }

    pub fn record_event(&self) {
        self.totals.events.fetch_add(1, Ordering::Relaxed);
        self.events.inc();
    }

    pub fn record_wait_timeout(&self) {
        self.totals.wait_timeouts.fetch_add(1, Ordering::Relaxed);
        self.wait_timeouts.inc();
    }

    pub fn record_resolution(&self, engine: &str) {
        self.totals.resolutions.fetch_add(1, Ordering::Relaxed);
        self.resolutions.with_label_values(&[engine]).inc();
    }

    pub fn snapshot(&self) -> DriverMetricsSnapshot {
        DriverMetricsSnapshot {
            commands: self.totals.commands.load(Ordering::Relaxed),
            command_failures: self.totals.command_failures.load(Ordering::Relaxed),
            command_latency_total_us: self.totals.command_latency_us.load(Ordering::Relaxed),
            events: self.totals.events.load(Ordering::Relaxed),
            wait_timeouts: self.totals.wait_timeouts.load(Ordering::Relaxed),
            resolutions: self.totals.resolutions.load(Ordering::Relaxed),
        }
    }
}

lazy_static! {
    static ref GLOBAL: DriverMetrics = DriverMetrics::new();
}

/// Process-wide metrics shared by the driver and the layers above it.
pub fn global() -> &'static DriverMetrics {
    &GLOBAL
}
