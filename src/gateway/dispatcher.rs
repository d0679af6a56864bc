//! Terminal pipeline stage: breaker-wrapped forwarding

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::registry::BackendRegistry;
use crate::error::{AppError, Result};
use crate::gateway::circuit_breaker::CircuitError;
use crate::gateway::proxy::{ProxyError, ProxyForwarder, ProxyRequest};
use crate::gateway::router::Route;

/// Forwards requests through the breaker of the route's backend
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    forwarder: ProxyForwarder,
    max_body_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<BackendRegistry>,
        forwarder: ProxyForwarder,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            registry,
            forwarder,
            max_body_bytes,
        }
    }

    /// Forward `request` to the backend bound to `route`
    pub async fn dispatch(&self, route: &Route, request: Request) -> Result<Response> {
        let backend = self
            .registry
            .get(&route.backend)
            .ok_or_else(|| AppError::BackendNotFound(route.backend.clone()))?;

        let proxy_request =
            ProxyRequest::from_request(request, route.strip_prefix.as_deref(), self.max_body_bytes)
                .await?;

        // Construction failures are local and never reach the breaker
        let outbound = self
            .forwarder
            .prepare(&backend.base_url, &proxy_request)
            .map_err(|e| AppError::ProxyConstruction(e.to_string()))?;

        debug!(
            backend = %backend.identity,
            method = %proxy_request.method,
            path = %proxy_request.path,
            "Dispatching request"
        );

        let breaker = self.registry.breaker(&backend.identity);
        match breaker.execute(|| self.forwarder.send(outbound)).await {
            Ok(response) => Ok(response.into_response()),
            Err(CircuitError::Open { identity }) => Err(AppError::CircuitOpen(identity)),
            Err(CircuitError::Inner(ProxyError::Unavailable(message))) => {
                warn!(backend = %backend.identity, error = %message, "Backend unavailable");
                Err(AppError::UpstreamUnavailable {
                    backend: backend.identity,
                    message,
                })
            }
            Err(CircuitError::Inner(ProxyError::ServerError(upstream))) => {
                Err(AppError::UpstreamServerError {
                    backend: backend.identity,
                    status: upstream.status,
                })
            }
            Err(CircuitError::Inner(ProxyError::Construction(message))) => {
                Err(AppError::ProxyConstruction(message))
            }
        }
    }
}
