//! Render pipeline counters.
//!
//! Counters are atomics; recent durations live in a bounded ring behind a
//! mutex for percentile estimates.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of duration samples kept in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Render metrics collector, shared by all jobs of a worker.
#[derive(Debug)]
pub struct RenderMetrics {
    renders_started: AtomicU64,
    renders_succeeded: AtomicU64,
    renders_failed: AtomicU64,
    renders_timed_out: AtomicU64,
    renders_rejected: AtomicU64,
    previews_generated: AtomicU64,
    previews_skipped: AtomicU64,
    bytes_published: AtomicU64,
    duration_samples: Mutex<VecDeque<Duration>>,
}

impl RenderMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self {
            renders_started: AtomicU64::new(0),
            renders_succeeded: AtomicU64::new(0),
            renders_failed: AtomicU64::new(0),
            renders_timed_out: AtomicU64::new(0),
            renders_rejected: AtomicU64::new(0),
            previews_generated: AtomicU64::new(0),
            previews_skipped: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            duration_samples: Mutex::new(VecDeque::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    /// A render attempt passed intake and started work.
    pub fn record_started(&self) {
        self.renders_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A render completed and was reconciled.
    pub fn record_success(&self, duration: Duration, published_bytes: u64) {
        self.renders_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_published
            .fetch_add(published_bytes, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    /// A render failed after starting.
    pub fn record_failure(&self) {
        self.renders_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A render timed out. Also counts as a failure.
    pub fn record_timeout(&self) {
        self.renders_timed_out.fetch_add(1, Ordering::Relaxed);
        self.renders_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A job was refused at intake (missing design, wrong state, format,
    /// busy lease).
    pub fn record_rejected(&self) {
        self.renders_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Preview outcome of a successful render.
    pub fn record_preview(&self, generated: bool) {
        if generated {
            self.previews_generated.fetch_add(1, Ordering::Relaxed);
        } else {
            self.previews_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(duration);
        }
    }

    /// Point-in-time view of all counters.
    pub fn snapshot(&self) -> RenderMetricsSnapshot {
        let durations: Vec<Duration> = self
            .duration_samples
            .lock()
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        let (p50, p95, p99) = percentiles(&durations);

        RenderMetricsSnapshot {
            renders_started: self.renders_started.load(Ordering::Relaxed),
            renders_succeeded: self.renders_succeeded.load(Ordering::Relaxed),
            renders_failed: self.renders_failed.load(Ordering::Relaxed),
            renders_timed_out: self.renders_timed_out.load(Ordering::Relaxed),
            renders_rejected: self.renders_rejected.load(Ordering::Relaxed),
            previews_generated: self.previews_generated.load(Ordering::Relaxed),
            previews_skipped: self.previews_skipped.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            duration_p50: p50,
            duration_p95: p95,
            duration_p99: p99,
            sample_count: durations.len() as u64,
        }
    }
}

impl Default for RenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentiles(durations: &[Duration]) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
    if durations.is_empty() {
        return (None, None, None);
    }

    let mut sorted = durations.to_vec();
    sorted.sort();
    let len = sorted.len();

    let p50 = sorted.get(len * 50 / 100).copied();
    let p95 = sorted.get(len * 95 / 100).copied();
    let p99 = sorted.get(len.saturating_sub(1) * 99 / 100).copied();

    (p50, p95, p99)
}

/// A point-in-time snapshot of render metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderMetricsSnapshot {
    /// Renders that passed intake.
    pub renders_started: u64,
    /// Renders completed and reconciled.
    pub renders_succeeded: u64,
    /// Renders that failed after starting (timeouts included).
    pub renders_failed: u64,
    /// Renders killed by the wall-clock limit.
    pub renders_timed_out: u64,
    /// Jobs refused at intake.
    pub renders_rejected: u64,
    /// Previews published.
    pub previews_generated: u64,
    /// Successful renders without a preview.
    pub previews_skipped: u64,
    /// Model bytes published.
    pub bytes_published: u64,
    /// P50 render duration.
    #[serde(with = "opt_millis")]
    pub duration_p50: Option<Duration>,
    /// P95 render duration.
    #[serde(with = "opt_millis")]
    pub duration_p95: Option<Duration>,
    /// P99 render duration.
    #[serde(with = "opt_millis")]
    pub duration_p99: Option<Duration>,
    /// Number of duration samples.
    pub sample_count: u64,
}

/// Optional durations as whole milliseconds.
mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let millis: Option<u64> = Option::deserialize(d)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let m = RenderMetrics::new();
        m.record_started();
        m.record_started();
        m.record_success(Duration::from_secs(40), 2048);
        m.record_failure();
        m.record_rejected();

        let snap = m.snapshot();
        assert_eq!(snap.renders_started, 2);
        assert_eq!(snap.renders_succeeded, 1);
        assert_eq!(snap.renders_failed, 1);
        assert_eq!(snap.renders_rejected, 1);
        assert_eq!(snap.bytes_published, 2048);
    }

    #[test]
    fn test_timeout_counts_as_failure() {
        let m = RenderMetrics::new();
        m.record_timeout();
        let snap = m.snapshot();
        assert_eq!(snap.renders_timed_out, 1);
        assert_eq!(snap.renders_failed, 1);
    }

    #[test]
    fn test_preview_outcomes() {
        let m = RenderMetrics::new();
        m.record_preview(true);
        m.record_preview(false);
        m.record_preview(false);
        let snap = m.snapshot();
        assert_eq!(snap.previews_generated, 1);
        assert_eq!(snap.previews_skipped, 2);
    }

    #[test]
    fn test_percentiles() {
        let m = RenderMetrics::new();
        for i in 1..=100 {
            m.record_success(Duration::from_millis(i * 10), 1);
        }
        let snap = m.snapshot();
        let p50 = snap.duration_p50.expect("p50");
        let p95 = snap.duration_p95.expect("p95");
        assert!(p95 > p50);
        assert!(snap.duration_p99.is_some());
    }

    #[test]
    fn test_samples_are_bounded() {
        let m = RenderMetrics::new();
        for _ in 0..(MAX_DURATION_SAMPLES + 50) {
            m.record_success(Duration::from_millis(5), 1);
        }
        assert_eq!(m.snapshot().sample_count, MAX_DURATION_SAMPLES as u64);
    }

    #[test]
    fn test_empty_percentiles() {
        let snap = RenderMetrics::new().snapshot();
        assert!(snap.duration_p50.is_none());
        assert!(snap.duration_p99.is_none());
    }

    #[test]
    fn test_snapshot_serialization() {
        let m = RenderMetrics::new();
        m.record_success(Duration::from_secs(3), 500);
        let json = serde_json::to_value(m.snapshot()).expect("serialize");
        assert_eq!(json["duration_p50"], 3000);
        let back: RenderMetricsSnapshot = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.renders_succeeded, 1);
        assert_eq!(back.duration_p50, Some(Duration::from_secs(3)));
    }
}
