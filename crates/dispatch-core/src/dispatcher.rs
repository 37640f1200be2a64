//! The router: ranks candidates, runs the winner under a timeout, updates
//! telemetry/circuit/session state, and retries down the ranked list.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dispatch_harness::capability::Capability;
use dispatch_harness::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use dispatch_harness::provider::{DispatchParams, DispatchResult};
use dispatch_harness::telemetry::{Outcome, Telemetry, TelemetryRecord};

use crate::config::DispatcherConfig;
use crate::cost::{CostEstimate, PriceBook, StaticPriceBook};
use crate::error::DispatchError;
use crate::policy::{Policy, RankOptions};
use crate::registry::Registry;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub result: DispatchResult,
    pub provider_id: String,
    pub cost_estimate: Option<CostEstimate>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    registry: Registry,
    telemetry: Telemetry,
    circuit_breaker: CircuitBreaker,
    session: Session,
    price_book: Box<dyn PriceBook>,
    per_call_timeout: Duration,
    max_retries: u32,
    rank_defaults: RankOptions,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_price_book(config, Box::new(StaticPriceBook::new()))
    }

    pub fn with_price_book(config: DispatcherConfig, price_book: Box<dyn PriceBook>) -> Self {
        let rank_defaults = RankOptions {
            prompt_length_threshold: config.prompt_length_threshold,
            json_bias_weight: config.json_bias_weight,
            latency_weight: config.latency_weight,
            failure_penalty: config.failure_penalty,
            exploration_epsilon: config.exploration_epsilon,
            cost_weight: config.cost_weight,
            ..Default::default()
        };

        Self {
            registry: Registry::new(),
            telemetry: Telemetry::new(config.telemetry_window),
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: config.circuit_failure_threshold,
                cool_off: Duration::from_millis(config.circuit_cool_off_ms),
            }),
            session: Session::new(config.session_budget_usd),
            price_book,
            per_call_timeout: Duration::from_millis(config.per_call_timeout_ms),
            max_retries: config.max_retries,
            rank_defaults,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Dispatch a request for `capability`. `provider_hint`, when set,
    /// restricts candidates to that single provider_id.
    pub async fn dispatch(
        &self,
        capability: impl Into<Capability>,
        params: DispatchParams,
        options: RankOptions,
        provider_hint: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let capability: Capability = capability.into();

        let mut candidates = self.registry.get(&capability);
        if let Some(hint) = provider_hint {
            candidates.retain(|c| c.provider_id == hint);
        }

        if candidates.is_empty() {
            return Err(DispatchError::NoProviders {
                capability: capability.to_string(),
            });
        }

        let session_status = self.session.status();
        let rank_options = RankOptions {
            session_budget: session_status.total,
            session_spent: session_status.spent,
            ..options
        };

        let policy = Policy::new(&self.circuit_breaker, &self.telemetry, self.price_book.as_ref());
        let ranked = policy.rank(&capability, candidates, &rank_options);

        if ranked.is_empty() {
            return Err(DispatchError::AllUnavailable {
                capability: capability.to_string(),
            });
        }

        let attempt_budget = 1 + self.max_retries as usize;
        let mut attempted_providers = Vec::new();
        let mut last_error: Option<DispatchError> = None;

        for candidate in ranked.into_iter().take(attempt_budget) {
            let provider_id = candidate.registration.provider_id.clone();
            attempted_providers.push(provider_id.clone());

            let cancel = CancellationToken::new();
            let started_at = Instant::now();

            let outcome = tokio::select! {
                biased;
                result = candidate.registration.handler.call(&params, cancel.clone()) => {
                    Ok(result)
                }
                _ = tokio::time::sleep(self.per_call_timeout) => {
                    cancel.cancel();
                    Err(())
                }
            };

            let latency_ms = started_at.elapsed().as_millis() as u64;

            match outcome {
                Ok(Ok(result)) => {
                    debug!(provider_id, %capability, latency_ms, "dispatch succeeded");
                    self.telemetry.record(TelemetryRecord::new(
                        provider_id.clone(),
                        capability.as_str(),
                        latency_ms,
                        Outcome::Success,
                    ));
                    self.circuit_breaker.on_success(&provider_id, capability.as_str());
                    if let Some(estimate) = candidate.cost_estimate.as_ref() {
                        self.session.charge(estimate.total_usd);
                    }
                    return Ok(DispatchOutcome {
                        result,
                        provider_id,
                        cost_estimate: candidate.cost_estimate,
                    });
                }
                Ok(Err(handler_error)) => {
                    warn!(provider_id, %capability, %handler_error, "dispatch attempt failed");
                    self.telemetry.record(TelemetryRecord::new(
                        provider_id.clone(),
                        capability.as_str(),
                        latency_ms,
                        Outcome::Failure,
                    ));
                    self.circuit_breaker.on_failure(&provider_id, capability.as_str());
                    last_error = Some(DispatchError::HandlerFailure {
                        provider_id: provider_id.clone(),
                        source: handler_error,
                    });
                }
                Err(()) => {
                    warn!(provider_id, %capability, latency_ms, "dispatch attempt timed out");
                    self.telemetry.record(TelemetryRecord::new(
                        provider_id.clone(),
                        capability.as_str(),
                        latency_ms,
                        Outcome::Timeout,
                    ));
                    self.circuit_breaker.on_failure(&provider_id, capability.as_str());
                    last_error = Some(DispatchError::HandlerTimeout {
                        provider_id: provider_id.clone(),
                        elapsed_ms: latency_ms,
                    });
                }
            }
        }

        Err(DispatchError::ExhaustedCandidates {
            capability: capability.to_string(),
            attempted: attempted_providers.len(),
            last_attempted_provider: attempted_providers.last().cloned(),
            attempted_providers,
            last_error: Box::new(
                last_error.expect("at least one candidate is attempted when ranked is non-empty"),
            ),
        })
    }

    /// Derive `prompt_length`/`has_schema` from `params` and merge them into
    /// `options` before dispatching, per the "character count of the
    /// textual field" rule in the routing contract.
    pub async fn dispatch_auto(
        &self,
        capability: impl Into<Capability>,
        params: DispatchParams,
        provider_hint: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let options = RankOptions {
            prompt_length: params.prompt_length(),
            has_schema: params.has_schema(),
            ..self.rank_defaults.clone()
        };
        self.dispatch(capability.into(), params, options, provider_hint).await
    }
}
