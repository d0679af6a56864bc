//! Registry of backends and their circuit breakers
//!
//! Constructed once at start-up and shared by reference. Each backend
//! identity maps to exactly one breaker for the life of the process.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backend::descriptor::BackendDescriptor;
use crate::config::CircuitBreakerConfig;
use crate::gateway::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

/// Backend registry
pub struct BackendRegistry {
    backends: RwLock<Vec<BackendDescriptor>>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    fallback_max_failures: u32,
    reset_timeout: Duration,
}

impl BackendRegistry {
    /// Create a registry with one breaker per known backend
    pub fn new(backends: Vec<BackendDescriptor>, config: &CircuitBreakerConfig) -> Self {
        let breakers = DashMap::new();
        for backend in &backends {
            breakers.insert(
                backend.identity.clone(),
                Arc::new(CircuitBreaker::new(
                    backend.identity.clone(),
                    config.max_failures,
                    config.reset_timeout(),
                )),
            );
        }

        info!(backends = backends.len(), "Initialized backend registry");

        Self {
            backends: RwLock::new(backends),
            breakers,
            fallback_max_failures: config.fallback_max_failures,
            reset_timeout: config.reset_timeout(),
        }
    }

    /// Add a backend discovered after start-up.
    ///
    /// Its breaker uses the fallback threshold. Registering an identity that
    /// already exists replaces the address and keeps the existing breaker.
    /// The HTTP routes are bound to the known backends only, so a new
    /// identity is reachable through [`Dispatcher`](crate::gateway::dispatcher::Dispatcher)
    /// with a [`Route`](crate::gateway::router::Route) naming it and is
    /// included in health reports, but gets no URL of its own.
    pub fn register(&self, backend: BackendDescriptor) {
        let breaker = self.breaker(&backend.identity);
        let mut backends = self.backends.write();
        match backends.iter_mut().find(|b| b.identity == backend.identity) {
            Some(existing) => *existing = backend,
            None => {
                info!(
                    backend = %backend.identity,
                    url = %backend.base_url,
                    max_failures = breaker.max_failures(),
                    "Registered backend"
                );
                backends.push(backend);
            }
        }
    }

    /// Look up a backend by identity
    pub fn get(&self, identity: &str) -> Option<BackendDescriptor> {
        self.backends
            .read()
            .iter()
            .find(|b| b.identity == identity)
            .cloned()
    }

    /// All backends in registration order
    pub fn get_all(&self) -> Vec<BackendDescriptor> {
        self.backends.read().clone()
    }

    /// Breaker for `identity`, created with the fallback threshold on first use
    pub fn breaker(&self, identity: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(identity) {
            return breaker.clone();
        }

        self.breakers
            .entry(identity.to_string())
            .or_insert_with(|| {
                info!(backend = %identity, "Created fallback circuit breaker");
                Arc::new(CircuitBreaker::new(
                    identity,
                    self.fallback_max_failures,
                    self.reset_timeout,
                ))
            })
            .clone()
    }

    /// Snapshot of every breaker, sorted by identity
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.identity.cmp(&b.identity));
        snapshots
    }
}
