//! Multi-objective candidate ranking.
//!
//! [`Policy::rank`] is the only place priority, latency, failure rate,
//! cost, JSON reliability, prompt length, and exploration jitter are
//! combined into a single score. Nothing here executes a handler — it
//! reads Registry + Telemetry + CircuitBreaker snapshots and returns an
//! ordering for the dispatcher to walk.

use dispatch_harness::capability::Capability;
use dispatch_harness::circuit_breaker::CircuitBreaker;
use dispatch_harness::telemetry::{Telemetry, TelemetryStats};

use crate::cost::{CostEstimate, CostEstimator, JitterSource, PriceBook, ThreadRngJitter};
use crate::registry::ProviderRegistration;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RankOptions {
    pub prompt_length: usize,
    pub has_schema: bool,
    pub expected_output_tokens: Option<u64>,
    pub prompt_length_threshold: usize,
    pub json_bias_weight: f64,
    pub latency_weight: f64,
    pub failure_penalty: f64,
    pub exploration_epsilon: f64,
    pub cost_weight: f64,
    /// Ledger snapshot injected by the dispatcher; `None` means unbounded.
    pub session_budget: Option<f64>,
    pub session_spent: f64,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            prompt_length: 0,
            has_schema: false,
            expected_output_tokens: None,
            prompt_length_threshold: 600,
            json_bias_weight: 1.0,
            latency_weight: 0.001,
            failure_penalty: 2.0,
            exploration_epsilon: 0.01,
            cost_weight: 1.0,
            session_budget: None,
            session_spent: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Scored candidate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub registration: ProviderRegistration,
    pub score: f64,
    pub stats: TelemetryStats,
    pub cost_estimate: Option<CostEstimate>,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct Policy<'a> {
    circuit_breaker: &'a CircuitBreaker,
    telemetry: &'a Telemetry,
    price_book: &'a dyn PriceBook,
    jitter: &'a dyn JitterSource,
}

impl<'a> Policy<'a> {
    pub fn new(
        circuit_breaker: &'a CircuitBreaker,
        telemetry: &'a Telemetry,
        price_book: &'a dyn PriceBook,
    ) -> Self {
        Self {
            circuit_breaker,
            telemetry,
            price_book,
            jitter: &ThreadRngJitter,
        }
    }

    pub fn with_jitter(mut self, jitter: &'a dyn JitterSource) -> Self {
        self.jitter = jitter;
        self
    }

    /// Rank `candidates` for `capability` under `options`. Candidates whose
    /// circuit is open, or whose estimated cost would exceed the remaining
    /// budget, are dropped before scoring. The effective cost weight (with
    /// its budget-pressure multiplier) is computed once from the options
    /// snapshot, not per candidate.
    pub fn rank(
        &self,
        capability: &Capability,
        candidates: Vec<ProviderRegistration>,
        options: &RankOptions,
    ) -> Vec<ScoredCandidate> {
        let effective_cost_weight = self.effective_cost_weight(options);
        let is_short = options.prompt_length > 0 && options.prompt_length < options.prompt_length_threshold;

        let estimator = CostEstimator::new(self.price_book);
        let mut scored = Vec::with_capacity(candidates.len());

        for registration in candidates {
            if self.circuit_breaker.is_open(&registration.provider_id, capability.as_str()) {
                continue;
            }

            let cost_estimate = if options.prompt_length > 0 {
                registration.capability_profile.cost.as_ref().map(|cost_params| {
                    estimator.estimate_with_variance(
                        options.prompt_length,
                        options.expected_output_tokens,
                        cost_params,
                        self.jitter,
                    )
                })
            } else {
                None
            };

            if let (Some(estimate), Some(budget)) = (cost_estimate.as_ref(), options.session_budget) {
                let remaining = budget - options.session_spent;
                if estimate.total_usd > remaining {
                    continue;
                }
            }

            let stats = self
                .telemetry
                .stats(&registration.provider_id, capability.as_str());

            let score = self.score(&registration, &stats, cost_estimate.clone(), options, is_short, effective_cost_weight);

            scored.push(ScoredCandidate {
                registration,
                score,
                stats,
                cost_estimate,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    fn effective_cost_weight(&self, options: &RankOptions) -> f64 {
        match options.session_budget {
            Some(total) if options.session_spent > 0.0 && total > 0.0 => {
                if options.session_spent / total > 0.8 {
                    options.cost_weight * 2.0
                } else {
                    options.cost_weight
                }
            }
            _ => options.cost_weight,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        registration: &ProviderRegistration,
        stats: &TelemetryStats,
        cost_estimate: Option<CostEstimate>,
        options: &RankOptions,
        is_short: bool,
        effective_cost_weight: f64,
    ) -> f64 {
        let mut score = registration.priority as f64;

        if is_short {
            let typical_latency_ms = registration
                .capability_profile
                .typical_latency_ms
                .unwrap_or(1)
                .max(1);
            score += 1.0 / typical_latency_ms as f64;
        }

        if options.has_schema {
            if let Some(json_reliability_score) = registration.capability_profile.json_reliability_score {
                score += options.json_bias_weight * json_reliability_score;
            }
        }

        if let Some(p95) = stats.p95_latency_ms {
            score -= options.latency_weight * p95 as f64;
        }

        if stats.count > 0 {
            score -= options.failure_penalty * stats.failure_rate();
        }

        if let Some(estimate) = cost_estimate {
            score -= effective_cost_weight * estimate.total_usd;
        }

        score += self.jitter.uniform(0.0, options.exploration_epsilon);

        score
    }
}
