//! Wires up two stub providers and runs a couple of dispatch calls, showing
//! the fallback path and the JSON-reliability bias in action.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use dispatch_core::{DispatchParams, Dispatcher, DispatcherConfig, RankOptions};
use dispatch_core::registry::CapabilityProfile;
use dispatch_harness::provider::{DispatchResult, HandlerError, ProviderHandler};

fn init_logging(service_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init()
        .ok();

    tracing::info!(service = service_name, "logging initialised");
}

/// Always succeeds after a short simulated delay.
struct ReliableHandler {
    delay: Duration,
    reply: String,
}

#[async_trait]
impl ProviderHandler for ReliableHandler {
    async fn call(
        &self,
        _params: &DispatchParams,
        _cancel: CancellationToken,
    ) -> Result<DispatchResult, HandlerError> {
        tokio::time::sleep(self.delay).await;
        Ok(DispatchResult::text(self.reply.clone()))
    }
}

/// Always fails; stands in for a backend that is down.
struct FlakyHandler;

#[async_trait]
impl ProviderHandler for FlakyHandler {
    async fn call(
        &self,
        _params: &DispatchParams,
        _cancel: CancellationToken,
    ) -> Result<DispatchResult, HandlerError> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err(HandlerError::Failed("upstream returned 503".to_string()))
    }
}

#[tokio::main]
async fn main() {
    init_logging("dispatch-demo", "info");

    let dispatcher = Dispatcher::new(DispatcherConfig {
        per_call_timeout_ms: 500,
        max_retries: 2,
        ..Default::default()
    });

    dispatcher
        .registry()
        .register(
            "small text",
            "flaky-primary",
            5,
            CapabilityProfile::new().with_typical_latency_ms(20),
            Arc::new(FlakyHandler),
        )
        .expect("register flaky-primary");

    dispatcher
        .registry()
        .register(
            "small text",
            "reliable-fallback",
            3,
            CapabilityProfile::new().with_typical_latency_ms(15),
            Arc::new(ReliableHandler {
                delay: Duration::from_millis(15),
                reply: "hello from the fallback".to_string(),
            }),
        )
        .expect("register reliable-fallback");

    let params = DispatchParams::new().with_prompt("summarize this in one sentence");

    match dispatcher.dispatch_auto("small text", params, None).await {
        Ok(outcome) => {
            tracing::info!(
                provider_id = %outcome.provider_id,
                result = ?outcome.result.as_str(),
                "dispatch succeeded"
            );
        }
        Err(err) => {
            tracing::error!(%err, "dispatch failed");
        }
    }

    dispatcher
        .registry()
        .register(
            "small structured object",
            "reliable-json",
            4,
            CapabilityProfile::new().with_json_reliability_score(0.95),
            Arc::new(ReliableHandler {
                delay: Duration::from_millis(5),
                reply: r#"{"ok":true}"#.to_string(),
            }),
        )
        .expect("register reliable-json");

    dispatcher
        .registry()
        .register(
            "small structured object",
            "higher-priority-flaky-json",
            5,
            CapabilityProfile::new().with_json_reliability_score(0.4),
            Arc::new(FlakyHandler),
        )
        .expect("register higher-priority-flaky-json");

    let schema_params = DispatchParams::new()
        .with_prompt("extract the fields")
        .with_schema(serde_json::json!({"type": "object"}));

    let options = RankOptions {
        has_schema: true,
        json_bias_weight: 3.0,
        ..Default::default()
    };

    match dispatcher
        .dispatch("small structured object", schema_params, options, None)
        .await
    {
        Ok(outcome) => {
            tracing::info!(provider_id = %outcome.provider_id, "structured dispatch succeeded");
        }
        Err(err) => {
            tracing::error!(%err, "structured dispatch failed");
        }
    }

    let status = dispatcher.session().status();
    tracing::info!(?status, "session status at exit");
}
