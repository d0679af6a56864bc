//! Bearer token authentication delegated to the identity service

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::gateway::circuit_breaker::{CircuitBreaker, CircuitError};

/// Identity confirmed by the identity service for the current request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedIdentity {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// `{"message": ..., "data": {"user_id": ..., "email": ...}}` returned on success
#[derive(Deserialize)]
struct ValidationSuccess {
    #[serde(default)]
    data: Option<ValidatedIdentity>,
}

/// `{"error": ..., "message": ...}` returned on rejection
#[derive(Deserialize)]
struct ValidationRejection {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

enum ValidationFailure {
    Transport(reqwest::Error),
    Server(StatusCode, Vec<u8>),
}

/// Strip an optional `Bearer ` prefix. Returns `None` when no token remains.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Validates tokens against the identity service's `/validate` endpoint
pub struct AuthGate {
    client: Client,
    validate_url: String,
    breaker: Arc<CircuitBreaker>,
}

impl AuthGate {
    /// `breaker` is the identity backend's breaker, shared with `/auth/*` forwarding
    pub fn new(auth_base_url: &str, timeout: Duration, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            validate_url: format!("{}/validate", auth_base_url.trim_end_matches('/')),
            breaker,
        })
    }

    /// Validate the raw `Authorization` header value
    pub async fn validate(&self, authorization: Option<&HeaderValue>) -> Result<ValidatedIdentity> {
        let Some(header) = authorization else {
            return Err(AppError::MissingToken);
        };
        let has_token = header.to_str().map(|h| bearer_token(h).is_some()).unwrap_or(true);
        if header.is_empty() || !has_token {
            return Err(AppError::MissingToken);
        }

        let header = reqwest::header::HeaderValue::from_bytes(header.as_bytes())
            .map_err(|_| AppError::invalid_token())?;

        let outcome = self
            .breaker
            .execute(|| async move {
                let response = match self
                    .client
                    .get(&self.validate_url)
                    .header(reqwest::header::AUTHORIZATION, header)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(e) => return Err(ValidationFailure::Transport(e)),
                };

                if response.status().is_server_error() {
                    let status = StatusCode::from_u16(response.status().as_u16())
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                    return Err(ValidationFailure::Server(status, body));
                }
                Ok(response)
            })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(CircuitError::Open { identity }) => return Err(AppError::CircuitOpen(identity)),
            Err(CircuitError::Inner(ValidationFailure::Transport(e))) => {
                warn!(error = %e, "Token validation request failed");
                return Err(AppError::ValidationTransport(e.to_string()));
            }
            Err(CircuitError::Inner(ValidationFailure::Server(status, body))) => {
                warn!(status = %status, "Identity service failed during validation");
                return Err(rejection_from_body(&body));
            }
        };

        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();

        if status != reqwest::StatusCode::OK {
            debug!(status = %status, "Token rejected");
            return Err(rejection_from_body(&body));
        }

        let identity = serde_json::from_slice::<ValidationSuccess>(&body)
            .ok()
            .and_then(|s| s.data)
            .unwrap_or_default();
        Ok(identity)
    }
}

/// Forward the identity service's `{error, message}` pair when present
fn rejection_from_body(body: &[u8]) -> AppError {
    match serde_json::from_slice::<ValidationRejection>(body) {
        Ok(rejection) => AppError::InvalidToken {
            code: rejection.error,
            message: rejection
                .message
                .unwrap_or_else(|| "Invalid or expired token".to_string()),
        },
        Err(_) => AppError::invalid_token(),
    }
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<AuthGate>,
}

impl AuthLayer {
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    gate: Arc<AuthGate>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // The ready clone goes to the future; a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        Box::pin(async move {
            let validation = gate.validate(request.headers().get(AUTHORIZATION)).await;
            match validation {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    inner.call(request).await
                }
                Err(err) => {
                    debug!(path = %request.uri().path(), code = err.code(), "Request rejected by auth gate");
                    Ok(err.into_response())
                }
            }
        })
    }
}
