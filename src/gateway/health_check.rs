//! Aggregated health probing of the backends

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::descriptor::BackendDescriptor;
use crate::backend::registry::BackendRegistry;
use crate::error::{AppError, Result};
use crate::gateway::circuit_breaker::CircuitState;

/// Identity under which the gateway reports itself
pub const GATEWAY: &str = "gateway";

/// Health of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Entry of the health report
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitState>,
}

impl ServiceHealth {
    fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            error: None,
            circuit_breaker: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: HealthState::Unhealthy,
            error: Some(error),
            circuit_breaker: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// Combined result of probing every backend
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Keyed by identity; includes the gateway itself
    pub services: BTreeMap<String, ServiceHealth>,
    pub healthy: bool,
}

/// Probes `<base_url>/health` of each backend
pub struct HealthAggregator {
    client: Client,
}

impl HealthAggregator {
    /// Create an aggregator whose probes time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Probe a single backend
    pub async fn probe(&self, backend: &BackendDescriptor) -> ServiceHealth {
        let url = backend.url_for("/health");

        match self.client.get(&url).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                debug!(backend = %backend.identity, "Health check passed");
                ServiceHealth::healthy()
            }
            Ok(response) => {
                warn!(
                    backend = %backend.identity,
                    status = %response.status(),
                    "Health check failed"
                );
                ServiceHealth::unhealthy(format!("unexpected status {}", response.status()))
            }
            Err(e) => {
                warn!(backend = %backend.identity, error = %e, "Health check failed");
                ServiceHealth::unhealthy(e.to_string())
            }
        }
    }

    /// Probe all `backends` concurrently
    pub async fn aggregate(&self, backends: &[BackendDescriptor]) -> HealthReport {
        // join_all yields results in input order, one slot per backend
        let results = join_all(backends.iter().map(|backend| self.probe(backend))).await;

        let mut services = BTreeMap::new();
        for (backend, health) in backends.iter().zip(results) {
            services.insert(backend.identity.clone(), health);
        }

        let healthy = services.values().all(ServiceHealth::is_healthy);
        services.insert(GATEWAY.to_string(), ServiceHealth::healthy());

        HealthReport { services, healthy }
    }

    /// Probe every registered backend and attach each one's breaker state
    pub async fn check_registry(&self, registry: &BackendRegistry) -> HealthReport {
        let mut report = self.aggregate(&registry.get_all()).await;
        for snapshot in registry.snapshots() {
            if let Some(entry) = report.services.get_mut(&snapshot.identity) {
                entry.circuit_breaker = Some(snapshot.state);
            }
        }
        report
    }
}
