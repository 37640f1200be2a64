//! Harness — provider abstraction, circuit breaker, and telemetry ring for the
//! dispatch crate.
//!
//! This crate is the reliability layer that sits underneath the routing
//! policy and retry loop in `dispatch-core`. It coordinates:
//! - Provider abstraction for model-inference calls (`provider`)
//! - A keyed three-state circuit breaker per (provider, capability) (`circuit_breaker`)
//! - A bounded rolling telemetry window with percentile stats (`telemetry`)
//!
//! Nothing in this crate knows about cost, scoring, or budgets — that's
//! `dispatch-core`'s job.

pub mod capability;
pub mod circuit_breaker;
pub mod provider;
pub mod telemetry;
