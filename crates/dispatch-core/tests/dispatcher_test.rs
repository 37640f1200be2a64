use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use dispatch_core::cost::CostParams;
use dispatch_core::registry::CapabilityProfile;
use dispatch_core::{DispatchError, DispatchParams, DispatchResult, Dispatcher, DispatcherConfig, HandlerError, ProviderHandler, RankOptions};

struct DelayedHandler {
    delay: Duration,
    outcome: Result<&'static str, &'static str>,
}

#[async_trait]
impl ProviderHandler for DelayedHandler {
    async fn call(
        &self,
        _params: &DispatchParams,
        _cancel: CancellationToken,
    ) -> Result<DispatchResult, HandlerError> {
        tokio::time::sleep(self.delay).await;
        match self.outcome {
            Ok(text) => Ok(DispatchResult::text(text)),
            Err(msg) => Err(HandlerError::Failed(msg.to_string())),
        }
    }
}

fn dispatcher_with(max_retries: u32, per_call_timeout_ms: u64) -> Dispatcher {
    Dispatcher::new(DispatcherConfig {
        max_retries,
        per_call_timeout_ms,
        ..Default::default()
    })
}

#[tokio::test]
async fn fastest_succeeds_first_fallback() {
    let dispatcher = dispatcher_with(2, 200);

    dispatcher
        .registry()
        .register(
            "T",
            "a",
            5,
            CapabilityProfile::new(),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(50),
                outcome: Err("boom"),
            }),
        )
        .unwrap();
    dispatcher
        .registry()
        .register(
            "T",
            "b",
            4,
            CapabilityProfile::new(),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(10),
                outcome: Ok("ok"),
            }),
        )
        .unwrap();

    let outcome = dispatcher
        .dispatch("T", DispatchParams::new(), RankOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.provider_id, "b");
    assert_eq!(outcome.result.as_str(), Some("ok"));

    let stats_a = dispatcher.telemetry().stats("a", "T");
    assert_eq!(stats_a.failure, 1);
    let stats_b = dispatcher.telemetry().stats("b", "T");
    assert_eq!(stats_b.success, 1);
}

#[tokio::test]
async fn budget_ceiling_excludes_a_provider_with_no_attempt_made() {
    let dispatcher = Dispatcher::new(DispatcherConfig {
        session_budget_usd: Some(0.001),
        ..Default::default()
    });

    dispatcher
        .registry()
        .register(
            "T",
            "pricey",
            1,
            CapabilityProfile::new().with_cost(CostParams {
                simulated_model_name: "default".to_string(),
                chars_per_token: 1.0,
                request_fixed_fee_usd: 0.005,
                discount_factor: 1.0,
            }),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(1),
                outcome: Ok("unused"),
            }),
        )
        .unwrap();

    let params = DispatchParams::new().with_prompt("x".repeat(400));
    let err = dispatcher.dispatch_auto("T", params, None).await.unwrap_err();

    assert!(matches!(err, DispatchError::AllUnavailable { .. }));
    assert!(dispatcher.telemetry().is_empty("pricey", "T"));
}

#[tokio::test]
async fn timeout_cancels_the_handler_and_counts_as_a_timeout() {
    let dispatcher = dispatcher_with(0, 20);

    dispatcher
        .registry()
        .register(
            "T",
            "slow",
            1,
            CapabilityProfile::new(),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(200),
                outcome: Ok("too late"),
            }),
        )
        .unwrap();

    let err = dispatcher
        .dispatch("T", DispatchParams::new(), RankOptions::default(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ExhaustedCandidates { .. }));
    let stats = dispatcher.telemetry().stats("slow", "T");
    assert_eq!(stats.timeout, 1);
    assert_eq!(stats.success, 0);
}

#[tokio::test]
async fn circuit_opens_after_repeated_failures_and_excludes_the_provider() {
    let dispatcher = Dispatcher::new(DispatcherConfig {
        circuit_failure_threshold: 2,
        circuit_cool_off_ms: 50,
        max_retries: 0,
        per_call_timeout_ms: 200,
        ..Default::default()
    });

    dispatcher
        .registry()
        .register(
            "T",
            "unreliable",
            5,
            CapabilityProfile::new(),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(1),
                outcome: Err("down"),
            }),
        )
        .unwrap();
    dispatcher
        .registry()
        .register(
            "T",
            "backup",
            1,
            CapabilityProfile::new(),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(1),
                outcome: Ok("backup ok"),
            }),
        )
        .unwrap();

    for _ in 0..2 {
        let _ = dispatcher
            .dispatch(
                "T",
                DispatchParams::new(),
                RankOptions::default(),
                Some("unreliable"),
            )
            .await;
    }
    assert!(dispatcher.circuit_breaker().is_open("unreliable", "T"));

    let outcome = dispatcher
        .dispatch("T", DispatchParams::new(), RankOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(outcome.provider_id, "backup");
}

#[tokio::test]
async fn successful_dispatch_charges_the_session_ledger() {
    let dispatcher = Dispatcher::new(DispatcherConfig {
        session_budget_usd: Some(10.0),
        ..Default::default()
    });

    dispatcher
        .registry()
        .register(
            "T",
            "priced",
            1,
            CapabilityProfile::new().with_cost(CostParams {
                simulated_model_name: "default".to_string(),
                chars_per_token: 4.0,
                request_fixed_fee_usd: 0.01,
                discount_factor: 1.0,
            }),
            Arc::new(DelayedHandler {
                delay: Duration::from_millis(1),
                outcome: Ok("done"),
            }),
        )
        .unwrap();

    let before = dispatcher.session().status().spent;
    let outcome = dispatcher
        .dispatch_auto("T", DispatchParams::new().with_prompt("a prompt"), None)
        .await
        .unwrap();
    let after = dispatcher.session().status().spent;

    let charged = outcome.cost_estimate.unwrap().total_usd;
    assert!((after - before - charged).abs() < 1e-9);
}
