//! Dispatch-level error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no providers registered for capability `{capability}`")]
    NoProviders { capability: String },

    #[error("all providers for capability `{capability}` are unavailable (circuit open or over budget)")]
    AllUnavailable { capability: String },

    #[error("handler for provider `{provider_id}` failed: {source}")]
    HandlerFailure {
        provider_id: String,
        #[source]
        source: dispatch_harness::provider::HandlerError,
    },

    #[error("handler for provider `{provider_id}` timed out after {elapsed_ms}ms")]
    HandlerTimeout { provider_id: String, elapsed_ms: u64 },

    #[error(
        "exhausted {attempted} candidate(s) for capability `{capability}`; last error: {last_error}"
    )]
    ExhaustedCandidates {
        capability: String,
        attempted: usize,
        attempted_providers: Vec<String>,
        last_attempted_provider: Option<String>,
        #[source]
        last_error: Box<DispatchError>,
    },
}

impl DispatchError {
    pub fn attempted_providers(&self) -> &[String] {
        match self {
            DispatchError::ExhaustedCandidates {
                attempted_providers, ..
            } => attempted_providers,
            _ => &[],
        }
    }

    pub fn last_attempted_provider(&self) -> Option<&str> {
        match self {
            DispatchError::ExhaustedCandidates {
                last_attempted_provider,
                ..
            } => last_attempted_provider.as_deref(),
            _ => None,
        }
    }

    /// The classified per-attempt error (`HandlerFailure`/`HandlerTimeout`)
    /// that caused the last attempted candidate to be skipped, when this is
    /// an `ExhaustedCandidates` error.
    pub fn last_error(&self) -> Option<&DispatchError> {
        match self {
            DispatchError::ExhaustedCandidates { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}
