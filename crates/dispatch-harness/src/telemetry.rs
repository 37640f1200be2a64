//! Bounded per-(provider, capability) telemetry ring.
//!
//! Each key keeps the most recent `window` outcome records in a `VecDeque`;
//! past that capacity the oldest record is dropped (FIFO). [`Telemetry::stats`]
//! derives counts and nearest-rank latency percentiles from the current
//! window in a single pass plus one sort.

use std::collections::VecDeque;

use dashmap::DashMap;

// ---------------------------------------------------------------------------
// Outcome / record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub provider_id: String,
    pub capability: String,
    pub latency_ms: u64,
    pub outcome: Outcome,
}

impl TelemetryRecord {
    pub fn new(
        provider_id: impl Into<String>,
        capability: impl Into<String>,
        latency_ms: u64,
        outcome: Outcome,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            capability: capability.into(),
            latency_ms,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryStats {
    pub count: usize,
    pub success: usize,
    pub failure: usize,
    pub timeout: usize,
    pub p50_latency_ms: Option<u64>,
    pub p95_latency_ms: Option<u64>,
}

impl TelemetryStats {
    pub fn failure_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.failure + self.timeout) as f64 / self.count as f64
        }
    }
}

fn key(provider_id: &str, capability: &str) -> (String, String) {
    (provider_id.to_string(), capability.to_string())
}

fn percentile(sorted_latencies: &[u64], p: f64) -> u64 {
    let n = sorted_latencies.len();
    let idx = ((p * (n - 1) as f64).floor() as usize).min(n - 1);
    sorted_latencies[idx]
}

// ---------------------------------------------------------------------------
// Telemetry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Telemetry {
    window: usize,
    rings: DashMap<(String, String), VecDeque<TelemetryRecord>>,
}

impl Telemetry {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            rings: DashMap::new(),
        }
    }

    pub fn record(&self, rec: TelemetryRecord) {
        let k = key(&rec.provider_id, &rec.capability);
        let mut ring = self.rings.entry(k).or_insert_with(VecDeque::new);
        ring.push_back(rec);
        while ring.len() > self.window {
            ring.pop_front();
        }
    }

    pub fn stats(&self, provider_id: &str, capability: &str) -> TelemetryStats {
        let k = key(provider_id, capability);
        let Some(ring) = self.rings.get(&k) else {
            return TelemetryStats::default();
        };

        let mut stats = TelemetryStats::default();
        let mut latencies: Vec<u64> = Vec::with_capacity(ring.len());
        for rec in ring.iter() {
            stats.count += 1;
            match rec.outcome {
                Outcome::Success => stats.success += 1,
                Outcome::Failure => stats.failure += 1,
                Outcome::Timeout => stats.timeout += 1,
            }
            latencies.push(rec.latency_ms);
        }

        if !latencies.is_empty() {
            latencies.sort_unstable();
            stats.p50_latency_ms = Some(percentile(&latencies, 0.5));
            stats.p95_latency_ms = Some(percentile(&latencies, 0.95));
        }

        stats
    }

    /// Current ring length for a key (for invariant checks / tests).
    pub fn len(&self, provider_id: &str, capability: &str) -> usize {
        let k = key(provider_id, capability);
        self.rings.get(&k).map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, provider_id: &str, capability: &str) -> bool {
        self.len(provider_id, capability) == 0
    }

    pub fn clear(&self) {
        self.rings.clear();
    }
}
