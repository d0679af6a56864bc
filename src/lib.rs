//! School management API gateway
//!
//! Front door for the auth, school and student services: routes requests,
//! validates bearer tokens against the auth service, and guards every
//! backend with its own circuit breaker.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod response;

pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;

use backend::{registry::BackendRegistry, BackendDescriptor, AUTH};
use gateway::{dispatcher::Dispatcher, health_check::HealthAggregator, proxy::ProxyForwarder};
use middleware::AuthGate;

/// Application state shared across all handlers
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub auth_gate: Arc<AuthGate>,
    pub health: Arc<HealthAggregator>,
}

impl AppState {
    /// Wire up the registry, breakers and outbound clients from settings
    pub fn from_settings(settings: &config::Settings) -> Result<Self> {
        let registry = Arc::new(BackendRegistry::new(
            BackendDescriptor::from_services(&settings.services),
            &settings.circuit_breaker,
        ));

        let forwarder = ProxyForwarder::new(Duration::from_secs(settings.timeouts.proxy_secs))?;
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            forwarder,
            settings.limits.max_body_bytes,
        ));

        let auth_gate = Arc::new(AuthGate::new(
            &settings.services.auth_url,
            Duration::from_secs(settings.timeouts.validation_secs),
            registry.breaker(AUTH),
        )?);

        let health = Arc::new(HealthAggregator::new(Duration::from_secs(
            settings.timeouts.health_secs,
        ))?);

        Ok(Self {
            registry,
            dispatcher,
            auth_gate,
            health,
        })
    }
}
