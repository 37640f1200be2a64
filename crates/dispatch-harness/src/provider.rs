//! Provider abstraction for dispatch-harness.
//!
//! Defines the [`ProviderHandler`] trait that every backend the dispatcher
//! can route to must implement, plus the typed parameter/result envelopes
//! that cross that boundary.
//!
//! # Overview
//!
//! The dispatch core never knows what a handler actually does — it only
//! inspects [`DispatchParams::prompt_length`] and [`DispatchParams::has_schema`]
//! to feed the routing policy, and passes everything else through untouched.
//!
//! # Implementation Guide
//!
//! To implement a new provider:
//!
//! 1. Create a struct to hold client state (API key, HTTP client, etc.)
//! 2. Implement [`ProviderHandler`] with your provider's API call
//! 3. Map provider-specific errors to [`HandlerError`] variants
//! 4. Honor the [`CancellationToken`] — stop work promptly once it fires
//!
//! # Example
//!
//! ```rust,no_run
//! use dispatch_harness::provider::{DispatchParams, DispatchResult, HandlerError, ProviderHandler};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl ProviderHandler for Echo {
//!     async fn call(
//!         &self,
//!         params: &DispatchParams,
//!         _cancel: CancellationToken,
//!     ) -> Result<DispatchResult, HandlerError> {
//!         Ok(DispatchResult::text(params.prompt.clone().unwrap_or_default()))
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("handler error: {0}")]
    Failed(String),
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// The typed projection of a request that crosses the handler boundary.
///
/// `prompt`/`text` and `schema` are the only fields the core inspects; any
/// other request data a concrete handler needs lives in `extra` and is never
/// touched by the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl DispatchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Character count of the textual field the caller identifies as
    /// prompt/text; 0 when neither is set. `prompt` is preferred over `text`
    /// when both are present.
    pub fn prompt_length(&self) -> usize {
        self.prompt
            .as_deref()
            .or(self.text.as_deref())
            .map(|s| s.chars().count())
            .unwrap_or(0)
    }

    /// Whether structured-object output was requested.
    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult(pub serde_json::Value);

impl DispatchResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self(serde_json::Value::String(content.into()))
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

// ---------------------------------------------------------------------------
// ProviderHandler trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait ProviderHandler: Send + Sync {
    /// Execute a single call against this provider.
    ///
    /// Implementations should race their own work against `cancel` (e.g. via
    /// `tokio::select!`) and return promptly once it fires; the dispatcher
    /// has already recorded this attempt as a timeout by that point and will
    /// discard the result either way.
    async fn call(
        &self,
        params: &DispatchParams,
        cancel: CancellationToken,
    ) -> Result<DispatchResult, HandlerError>;
}

// ---------------------------------------------------------------------------
// StubHandler – returns an error for every call. Useful in tests/demos as a
// placeholder for a provider that hasn't been wired up yet.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StubHandler {
    provider_name: String,
}

impl StubHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            provider_name: name.into(),
        }
    }
}

#[async_trait::async_trait]
impl ProviderHandler for StubHandler {
    async fn call(
        &self,
        _params: &DispatchParams,
        _cancel: CancellationToken,
    ) -> Result<DispatchResult, HandlerError> {
        Err(HandlerError::NotConfigured(format!(
            "{} provider is not configured — install a concrete implementation",
            self.provider_name
        )))
    }
}
