//! Request forwarding to backend services
//!
//! The inbound request is buffered into a [`ProxyRequest`], replayed against
//! `<base_url><path>?<query>` with the same method, headers and body, and the
//! upstream status, headers and body are relayed back unchanged.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Buffered inbound request
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Buffer an inbound request, removing `strip_prefix` from the path
    pub async fn from_request(
        request: Request,
        strip_prefix: Option<&str>,
        max_body_bytes: usize,
    ) -> Result<Self> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        let path = match strip_prefix {
            Some(prefix) => strip_path_prefix(parts.uri.path(), prefix),
            None => parts.uri.path().to_string(),
        };

        Ok(Self {
            method: parts.method,
            path,
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// `<base_url><path>[?<query>]`
    pub fn target_url(&self, base_url: &str) -> String {
        match self.query.as_deref() {
            Some(query) if !query.is_empty() => format!("{}{}?{}", base_url, self.path, query),
            _ => format!("{}{}", base_url, self.path),
        }
    }
}

/// Remove a fixed prefix from a path; an empty remainder becomes `/`
pub fn strip_path_prefix(path: &str, prefix: &str) -> String {
    match path.strip_prefix(prefix) {
        Some("") => "/".to_string(),
        Some(rest) => rest.to_string(),
        None => path.to_string(),
    }
}

/// Upstream response relayed to the caller
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Forwarding failures
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build outbound request: {0}")]
    Construction(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream returned {}", .0.status)]
    ServerError(ProxyResponse),
}

/// Relays requests to backends over a shared HTTP client
pub struct ProxyForwarder {
    client: Client,
}

impl ProxyForwarder {
    /// Create a forwarder whose outbound calls time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Build and send `request` to `base_url`
    pub async fn forward(
        &self,
        base_url: &str,
        request: &ProxyRequest,
    ) -> std::result::Result<ProxyResponse, ProxyError> {
        let outbound = self.prepare(base_url, request)?;
        self.send(outbound).await
    }

    /// Build the outbound request without sending it
    pub fn prepare(
        &self,
        base_url: &str,
        request: &ProxyRequest,
    ) -> std::result::Result<reqwest::Request, ProxyError> {
        let url = request.target_url(base_url);
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| ProxyError::Construction(e.to_string()))?;

        let mut headers = reqwest::header::HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            if is_connection_header(name) {
                continue;
            }
            let name = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes())
                .map_err(|e| ProxyError::Construction(e.to_string()))?;
            let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| ProxyError::Construction(e.to_string()))?;
            headers.append(name, value);
        }

        self.client
            .request(method, &url)
            .headers(headers)
            .body(request.body.clone())
            .build()
            .map_err(|e| ProxyError::Construction(e.to_string()))
    }

    /// Send a prepared request and buffer the response.
    ///
    /// A status of 500 or above is returned as [`ProxyError::ServerError`]
    /// carrying the full upstream response.
    pub async fn send(
        &self,
        outbound: reqwest::Request,
    ) -> std::result::Result<ProxyResponse, ProxyError> {
        let url = outbound.url().clone();
        debug!(method = %outbound.method(), url = %url, "Forwarding request");

        let upstream = self.client.execute(outbound).await.map_err(|e| {
            warn!(url = %url, error = %e, "Proxy request failed");
            ProxyError::Unavailable(e.to_string())
        })?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .map_err(|e| ProxyError::Unavailable(e.to_string()))?;

        let mut headers = HeaderMap::with_capacity(upstream.headers().len());
        for (name, value) in upstream.headers() {
            let name = HeaderName::from_bytes(name.as_str().as_bytes())
                .map_err(|e| ProxyError::Unavailable(e.to_string()))?;
            let value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| ProxyError::Unavailable(e.to_string()))?;
            headers.append(name, value);
        }

        let body = upstream.bytes().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to read upstream body");
            ProxyError::Unavailable(e.to_string())
        })?;

        let response = ProxyResponse {
            status,
            headers,
            body,
        };

        if status.is_server_error() {
            warn!(url = %url, status = %status, "Upstream returned server error");
            return Err(ProxyError::ServerError(response));
        }

        Ok(response)
    }
}

/// Headers that describe the inbound connection rather than the request
fn is_connection_header(name: &HeaderName) -> bool {
    *name == header::HOST || *name == header::TRANSFER_ENCODING
}
