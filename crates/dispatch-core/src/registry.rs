//! Capability → ranked provider list.
//!
//! A `Registry` is typically written once at startup and read many times
//! during dispatch; `get` hands back clones so ranking never observes a
//! registration list being mutated mid-read.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use crate::cost::CostParams;
use dispatch_harness::capability::Capability;
use dispatch_harness::provider::ProviderHandler;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("provider `{provider_id}` is already registered for capability `{capability}`")]
    DuplicateProvider {
        provider_id: String,
        capability: String,
    },
}

// ---------------------------------------------------------------------------
// Capability profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CapabilityProfile {
    pub typical_latency_ms: Option<u64>,
    pub json_reliability_score: Option<f64>,
    pub cost: Option<CostParams>,
}

impl CapabilityProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_typical_latency_ms(mut self, ms: u64) -> Self {
        self.typical_latency_ms = Some(ms);
        self
    }

    pub fn with_json_reliability_score(mut self, score: f64) -> Self {
        self.json_reliability_score = Some(score);
        self
    }

    pub fn with_cost(mut self, cost: CostParams) -> Self {
        self.cost = Some(cost);
        self
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ProviderRegistration {
    pub capability: Capability,
    pub provider_id: String,
    pub priority: i64,
    pub capability_profile: CapabilityProfile,
    pub handler: Arc<dyn ProviderHandler>,
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("capability", &self.capability)
            .field("provider_id", &self.provider_id)
            .field("priority", &self.priority)
            .field("capability_profile", &self.capability_profile)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Registry {
    by_capability: RwLock<HashMap<Capability, Vec<ProviderRegistration>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a capability. Rejects a pair already present
    /// under the same capability; a provider_id may still be registered
    /// under other capabilities.
    pub fn register(
        &self,
        capability: impl Into<Capability>,
        provider_id: impl Into<String>,
        priority: i64,
        capability_profile: CapabilityProfile,
        handler: Arc<dyn ProviderHandler>,
    ) -> Result<(), RegistryError> {
        let capability: Capability = capability.into();
        let provider_id = provider_id.into();

        let mut guard = self.by_capability.write().expect("registry lock poisoned");
        let list = guard.entry(capability.clone()).or_default();

        if list.iter().any(|r| r.provider_id == provider_id) {
            return Err(RegistryError::DuplicateProvider {
                provider_id,
                capability: capability.to_string(),
            });
        }

        list.push(ProviderRegistration {
            capability,
            provider_id,
            priority,
            capability_profile,
            handler,
        });
        list.sort_by(|a, b| b.priority.cmp(&a.priority));

        Ok(())
    }

    /// Snapshot of the current registration list for a capability, sorted
    /// by priority descending with ties in insertion order.
    pub fn get(&self, capability: &Capability) -> Vec<ProviderRegistration> {
        self.by_capability
            .read()
            .expect("registry lock poisoned")
            .get(capability)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.by_capability.write().expect("registry lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_harness::provider::StubHandler;

    fn stub() -> Arc<dyn ProviderHandler> {
        Arc::new(StubHandler::new("stub"))
    }

    #[test]
    fn registrations_are_ordered_by_priority_descending() {
        let registry = Registry::new();
        registry
            .register("small text", "low", 1, CapabilityProfile::new(), stub())
            .unwrap();
        registry
            .register("small text", "high", 9, CapabilityProfile::new(), stub())
            .unwrap();
        registry
            .register("small text", "mid", 5, CapabilityProfile::new(), stub())
            .unwrap();

        let ids: Vec<_> = registry
            .get(&Capability::new("small text"))
            .into_iter()
            .map(|r| r.provider_id)
            .collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let registry = Registry::new();
        registry
            .register("small text", "first", 5, CapabilityProfile::new(), stub())
            .unwrap();
        registry
            .register("small text", "second", 5, CapabilityProfile::new(), stub())
            .unwrap();

        let ids: Vec<_> = registry
            .get(&Capability::new("small text"))
            .into_iter()
            .map(|r| r.provider_id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn duplicate_provider_capability_pair_is_rejected() {
        let registry = Registry::new();
        registry
            .register("small text", "dup", 1, CapabilityProfile::new(), stub())
            .unwrap();
        let err = registry
            .register("small text", "dup", 2, CapabilityProfile::new(), stub())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProvider { .. }));
    }

    #[test]
    fn same_provider_id_allowed_under_different_capabilities() {
        let registry = Registry::new();
        registry
            .register("small text", "shared", 1, CapabilityProfile::new(), stub())
            .unwrap();
        registry
            .register("embedding", "shared", 1, CapabilityProfile::new(), stub())
            .unwrap();
        assert_eq!(registry.get(&Capability::new("small text")).len(), 1);
        assert_eq!(registry.get(&Capability::new("embedding")).len(), 1);
    }

    #[test]
    fn unknown_capability_returns_empty() {
        let registry = Registry::new();
        assert!(registry.get(&Capability::new("nothing registered")).is_empty());
    }
}
