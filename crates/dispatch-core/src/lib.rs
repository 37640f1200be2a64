//! Dispatch core — registry, cost estimation, routing policy, session
//! budgets, and the retrying dispatcher itself.
//!
//! This crate owns everything that knows about *which* provider should
//! handle a request and *what it costs*; the reliability primitives it
//! builds on (provider trait, circuit breaker, telemetry ring) live one
//! layer down in `dispatch-harness`.

pub mod config;
pub mod cost;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod registry;
pub mod session;

pub use config::DispatcherConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::DispatchError;
pub use policy::{Policy, RankOptions, ScoredCandidate};
pub use registry::{CapabilityProfile, ProviderRegistration, Registry, RegistryError};
pub use session::Session;

pub use dispatch_harness::capability::Capability;
pub use dispatch_harness::provider::{DispatchParams, DispatchResult, HandlerError, ProviderHandler};
