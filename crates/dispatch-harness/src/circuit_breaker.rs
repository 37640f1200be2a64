//! Per-(provider, capability) circuit breaker.
//!
//! A fresh key starts **closed**. `failure_threshold` consecutive failures
//! trip it to **open**; it self-heals to **half-open** the next time
//! [`CircuitBreaker::is_open`] is queried after `cool_off` has elapsed, and a
//! single `on_success`/`on_failure` from that trial call decides whether it
//! closes again or re-opens. Unlike a single shared breaker, failures and
//! successes for unrelated keys never interact.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation — calls are scored and attempted.
    Closed,
    /// Too many consecutive failures — excluded from ranking until cool-off elapses.
    Open,
    /// Cool-off elapsed — exactly one trial call decides the next transition.
    HalfOpen,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before a key trips to open.
    pub failure_threshold: u32,
    /// How long a key stays open before the next `is_open` query promotes it to half-open.
    pub cool_off: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_off: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-key entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl BreakerEntry {
    fn fresh() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

fn key(provider_id: &str, capability: &str) -> (String, String) {
    (provider_id.to_string(), capability.to_string())
}

// ---------------------------------------------------------------------------
// CircuitBreaker
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    entries: DashMap<(String, String), BreakerEntry>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// True iff the key is open and its cool-off has not yet elapsed. A
    /// never-seen key is treated as closed. If the key is open and cool-off
    /// *has* elapsed, this call promotes it to half-open as a side effect and
    /// returns `false`.
    pub fn is_open(&self, provider_id: &str, capability: &str) -> bool {
        let k = key(provider_id, capability);
        let Some(mut entry) = self.entries.get_mut(&k) else {
            return false;
        };
        match entry.state {
            CircuitState::Open => {
                let elapsed = entry
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cool_off)
                    .unwrap_or(true);
                if elapsed {
                    info!(provider_id, capability, "circuit open -> half-open");
                    entry.state = CircuitState::HalfOpen;
                    false
                } else {
                    true
                }
            }
            CircuitState::Closed | CircuitState::HalfOpen => false,
        }
    }

    /// Current state without side effects (does not promote open -> half-open).
    pub fn state(&self, provider_id: &str, capability: &str) -> CircuitState {
        let k = key(provider_id, capability);
        self.entries
            .get(&k)
            .map(|e| e.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn on_success(&self, provider_id: &str, capability: &str) {
        let k = key(provider_id, capability);
        let mut entry = self.entries.entry(k).or_insert_with(BreakerEntry::fresh);
        if entry.state != CircuitState::Closed {
            info!(provider_id, capability, from = ?entry.state, "circuit -> closed");
        }
        entry.state = CircuitState::Closed;
        entry.consecutive_failures = 0;
        entry.opened_at = None;
    }

    pub fn on_failure(&self, provider_id: &str, capability: &str) {
        let k = key(provider_id, capability);
        let mut entry = self.entries.entry(k).or_insert_with(BreakerEntry::fresh);
        entry.consecutive_failures += 1;

        if entry.consecutive_failures >= self.config.failure_threshold {
            if entry.state != CircuitState::Open {
                warn!(
                    provider_id,
                    capability,
                    failures = entry.consecutive_failures,
                    "circuit -> open"
                );
            }
            entry.state = CircuitState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }

    /// Number of consecutive failures currently recorded for a key.
    pub fn consecutive_failures(&self, provider_id: &str, capability: &str) -> u32 {
        let k = key(provider_id, capability);
        self.entries.get(&k).map(|e| e.consecutive_failures).unwrap_or(0)
    }

    /// Reset a single key back to closed (used by tests and manual recovery).
    pub fn reset(&self, provider_id: &str, capability: &str) {
        let k = key(provider_id, capability);
        self.entries.insert(k, BreakerEntry::fresh());
    }

    /// Drop all keys (used only by tests).
    pub fn clear(&self) {
        self.entries.clear();
    }
}
