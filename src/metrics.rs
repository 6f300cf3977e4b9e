//! Reuse and latency metrics for the verification cache.
//!
//! The aggregator keeps running counters and latency sums for the three
//! request paths (new verification, reuse, audit). Means are derived at
//! snapshot time, so memory stays constant regardless of request volume.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct LatencySamples {
    count: u64,
    total: Duration,
}

impl LatencySamples {
    fn record(&mut self, latency: Duration) {
        self.count += 1;
        self.total += latency;
    }

    fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total.as_secs_f64() * 1000.0 / self.count as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    new_verifications: u64,
    reused_verifications: u64,
    new_latency: LatencySamples,
    reuse_latency: LatencySamples,
    audit_latency: LatencySamples,
}

/// Point-in-time view of the cache metrics.
///
/// Every ratio is `0.0` when its divisor is zero.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Verification requests seen.
    pub total_requests: u64,
    /// Requests that ran the verification callback.
    pub new_verifications: u64,
    /// Requests answered from an existing record.
    pub reused_verifications: u64,
    /// `reused / total * 100`.
    pub reuse_rate_pct: f64,
    /// Callback runs without the cache (one per request).
    pub baseline_cycles: u64,
    /// Callback runs with the cache.
    pub cached_cycles: u64,
    /// Callback runs avoided.
    pub cycles_eliminated: u64,
    /// `cycles_eliminated / baseline_cycles * 100`.
    pub cycle_reduction_pct: f64,
    /// Mean latency of new verifications.
    pub avg_new_latency_ms: f64,
    /// Mean latency of reused verifications.
    pub avg_reuse_latency_ms: f64,
    /// `avg_new_latency_ms - avg_reuse_latency_ms`.
    pub latency_reduction_ms: f64,
    /// `(avg_new - avg_reuse) / avg_new * 100`.
    pub latency_reduction_pct: f64,
    /// Audits performed.
    pub audits: u64,
    /// Mean audit latency.
    pub avg_audit_latency_ms: f64,
    /// `avg_new_latency_ms / avg_audit_latency_ms`.
    pub audit_speedup: f64,
    /// Records currently stored.
    pub unique_records: u64,
    /// `unique_records / total_requests * 100`.
    pub storage_efficiency_pct: f64,
}

/// Collects hit/miss outcomes and latency samples.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    counters: Mutex<Counters>,
}

impl MetricsAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that ran the verification callback.
    pub fn record_new(&self, latency: Duration) {
        let mut c = self.counters.lock();
        c.total_requests += 1;
        c.new_verifications += 1;
        c.new_latency.record(latency);
    }

    /// Record a request answered from the cache.
    pub fn record_reuse(&self, latency: Duration) {
        let mut c = self.counters.lock();
        c.total_requests += 1;
        c.reused_verifications += 1;
        c.reuse_latency.record(latency);
    }

    /// Record an audit lookup.
    pub fn record_audit(&self, latency: Duration) {
        self.counters.lock().audit_latency.record(latency);
    }

    /// Compute a snapshot. `unique_records` is supplied by the caller because
    /// the aggregator does not see the store.
    #[must_use]
    pub fn snapshot(&self, unique_records: usize) -> MetricsSnapshot {
        let c = self.counters.lock();
        let total = c.total_requests;
        let reused = c.reused_verifications;
        let unique_records = unique_records as u64;

        let avg_new = c.new_latency.mean_ms();
        let avg_reuse = c.reuse_latency.mean_ms();
        let avg_audit = c.audit_latency.mean_ms();

        MetricsSnapshot {
            total_requests: total,
            new_verifications: c.new_verifications,
            reused_verifications: reused,
            reuse_rate_pct: percent(reused as f64, total as f64),
            baseline_cycles: total,
            cached_cycles: c.new_verifications,
            cycles_eliminated: reused,
            cycle_reduction_pct: percent(reused as f64, total as f64),
            avg_new_latency_ms: avg_new,
            avg_reuse_latency_ms: avg_reuse,
            latency_reduction_ms: avg_new - avg_reuse,
            latency_reduction_pct: percent(avg_new - avg_reuse, avg_new),
            audits: c.audit_latency.count,
            avg_audit_latency_ms: avg_audit,
            audit_speedup: ratio(avg_new, avg_audit),
            unique_records,
            storage_efficiency_pct: percent(unique_records as f64, total as f64),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    ratio(numerator * 100.0, denominator)
}
