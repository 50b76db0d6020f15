use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use vp_core::processor::ProcessReport;

const INVOCATION_BUCKETS_SECONDS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0,
];

/// Lock-free histogram with fixed buckets.
///
/// Each observation increments exactly one bucket (non-cumulative storage).
struct Histogram {
    upper_bounds_nanos: Vec<u64>,
    bucket_counts: Vec<AtomicU64>,
    sum_nanos: AtomicU64,
}

impl Histogram {
    fn from_seconds_bounds(bounds: &[f64]) -> Self {
        let upper_bounds_nanos: Vec<u64> = bounds
            .iter()
            .map(|sec| (*sec * 1_000_000_000.0) as u64)
            .collect();
        let bucket_counts = (0..=upper_bounds_nanos.len())
            .map(|_| AtomicU64::new(0))
            .collect();
        Self {
            upper_bounds_nanos,
            bucket_counts,
            sum_nanos: AtomicU64::new(0),
        }
    }

    fn observe(&self, elapsed: Duration) {
        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        let idx = self
            .upper_bounds_nanos
            .iter()
            .position(|bound| nanos <= *bound)
            .unwrap_or(self.upper_bounds_nanos.len());
        self.bucket_counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.bucket_counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub elements: u64,
    pub watermarks: u64,
    pub invocations: u64,
    pub fires: u64,
    pub clears: u64,
    pub dropped_late: u64,
    pub late_side_output: u64,
    pub failures: u64,
    pub outputs: u64,
    pub swept: u64,
    pub processors_created: u64,
    pub processors_retired: u64,
    pub active_processors: u64,
}

/// Shared engine counters. Updates are lock-free.
pub struct EngineMetrics {
    elements_total: AtomicU64,
    watermarks_total: AtomicU64,
    invocations_total: AtomicU64,
    fires_total: AtomicU64,
    clears_total: AtomicU64,
    dropped_late_total: AtomicU64,
    late_side_output_total: AtomicU64,
    failures_total: AtomicU64,
    outputs_total: AtomicU64,
    swept_total: AtomicU64,
    processors_created_total: AtomicU64,
    processors_retired_total: AtomicU64,
    active_processors: AtomicU64,
    command_seconds: Histogram,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            elements_total: AtomicU64::new(0),
            watermarks_total: AtomicU64::new(0),
            invocations_total: AtomicU64::new(0),
            fires_total: AtomicU64::new(0),
            clears_total: AtomicU64::new(0),
            dropped_late_total: AtomicU64::new(0),
            late_side_output_total: AtomicU64::new(0),
            failures_total: AtomicU64::new(0),
            outputs_total: AtomicU64::new(0),
            swept_total: AtomicU64::new(0),
            processors_created_total: AtomicU64::new(0),
            processors_retired_total: AtomicU64::new(0),
            active_processors: AtomicU64::new(0),
            command_seconds: Histogram::from_seconds_bounds(INVOCATION_BUCKETS_SECONDS),
        }
    }

    pub fn inc_element(&self) {
        self.elements_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_watermark(&self) {
        self.watermarks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold the counters of one committed command.
    pub fn add_report(&self, report: &ProcessReport, elapsed: Duration) {
        self.invocations_total
            .fetch_add(report.invocations, Ordering::Relaxed);
        self.fires_total.fetch_add(report.fired, Ordering::Relaxed);
        self.clears_total.fetch_add(report.cleared, Ordering::Relaxed);
        self.dropped_late_total
            .fetch_add(report.dropped_late, Ordering::Relaxed);
        self.late_side_output_total
            .fetch_add(report.late_side_output, Ordering::Relaxed);
        self.command_seconds.observe(elapsed);
    }

    pub fn inc_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_output(&self) {
        self.outputs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_swept(&self, n: usize) {
        self.swept_total.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn processor_created(&self) {
        self.processors_created_total.fetch_add(1, Ordering::Relaxed);
        self.active_processors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processor_retired(&self) {
        self.processors_retired_total.fetch_add(1, Ordering::Relaxed);
        self.active_processors.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        MetricsSnapshot {
            elements: load(&self.elements_total),
            watermarks: load(&self.watermarks_total),
            invocations: load(&self.invocations_total),
            fires: load(&self.fires_total),
            clears: load(&self.clears_total),
            dropped_late: load(&self.dropped_late_total),
            late_side_output: load(&self.late_side_output_total),
            failures: load(&self.failures_total),
            outputs: load(&self.outputs_total),
            swept: load(&self.swept_total),
            processors_created: load(&self.processors_created_total),
            processors_retired: load(&self.processors_retired_total),
            active_processors: load(&self.active_processors),
        }
    }

    pub fn summary_line(&self) -> String {
        let s = self.snapshot();
        format!(
            concat!(
                "elements={} invocations={} fires={} clears={} dropped_late={} ",
                "late_side={} failures={} outputs={} swept={} processors={}/{}",
            ),
            s.elements,
            s.invocations,
            s.fires,
            s.clears,
            s.dropped_late,
            s.late_side_output,
            s.failures,
            s.outputs,
            s.swept,
            s.active_processors,
            s.processors_created,
        )
    }

    /// Prometheus text exposition of every metric.
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        let mut types = BTreeSet::new();
        for (name, value) in [
            ("vp_elements_total", s.elements),
            ("vp_watermarks_total", s.watermarks),
            ("vp_invocations_total", s.invocations),
            ("vp_fires_total", s.fires),
            ("vp_clears_total", s.clears),
            ("vp_dropped_late_total", s.dropped_late),
            ("vp_late_side_output_total", s.late_side_output),
            ("vp_failures_total", s.failures),
            ("vp_outputs_total", s.outputs),
            ("vp_state_swept_total", s.swept),
            ("vp_processors_created_total", s.processors_created),
            ("vp_processors_retired_total", s.processors_retired),
        ] {
            render_type_once(&mut out, &mut types, name, "counter");
            let _ = writeln!(out, "{name} {value}");
        }
        render_type_once(&mut out, &mut types, "vp_active_processors", "gauge");
        let _ = writeln!(out, "vp_active_processors {}", s.active_processors);
        self.render_histogram(&mut out, &mut types, "vp_command_seconds");
        out
    }

    fn render_histogram(&self, out: &mut String, types: &mut BTreeSet<String>, name: &str) {
        let h = &self.command_seconds;
        render_type_once(out, types, name, "histogram");
        let mut cumulative = 0u64;
        for (idx, bound) in h.upper_bounds_nanos.iter().enumerate() {
            cumulative += h.bucket_counts[idx].load(Ordering::Relaxed);
            let le = *bound as f64 / 1_000_000_000.0;
            let _ = writeln!(out, "{name}_bucket{{le=\"{le:.6}\"}} {cumulative}");
        }
        let total = h.count();
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {total}");
        let sum = h.sum_nanos.load(Ordering::Relaxed) as f64 / 1_000_000_000.0;
        let _ = writeln!(out, "{name}_sum {sum}");
        let _ = writeln!(out, "{name}_count {total}");
    }
}

fn render_type_once(out: &mut String, types: &mut BTreeSet<String>, name: &str, kind: &str) {
    if types.insert(name.to_string()) {
        let _ = writeln!(out, "# TYPE {name} {kind}");
    }
}
