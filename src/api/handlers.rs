//! HTTP handlers for the gateway's own endpoints and the forwarding routes

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::gateway::router::Route;
use crate::response::{success, ErrorResponse};
use crate::AppState;

/// Forward to the backend bound to the matched route
pub async fn forward(
    State(state): State<Arc<AppState>>,
    Extension(route): Extension<Arc<Route>>,
    request: Request,
) -> Result<Response> {
    state.dispatcher.dispatch(&route, request).await
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let report = state.health.check_registry(&state.registry).await;

    if report.healthy {
        success(StatusCode::OK, "All services are healthy", Some(report.services))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::with_data(
                "PARTIAL_OUTAGE",
                "Some services are unhealthy",
                report.services,
            )),
        )
            .into_response()
    }
}

/// `GET /docs` and `GET /`
pub async fn docs() -> Response {
    success(StatusCode::OK, "API Documentation", Some(documentation()))
}

/// Fallback for unmatched paths
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Fallback for unsupported methods on a matched path
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

fn endpoint(method: &str, path: &str, description: &str, protected: bool) -> serde_json::Value {
    let mut entry = json!({
        "method": method,
        "path": path,
        "description": description,
    });
    if protected {
        entry["auth"] = json!("required");
    }
    entry
}

fn documentation() -> serde_json::Value {
    json!({
        "title": "School Management API Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "API Gateway for School Management Microservices",
        "endpoints": {
            "auth": {
                "signup": endpoint("POST", "/auth/signup", "Register a new user", false),
                "login": endpoint("POST", "/auth/login", "Login user and get JWT tokens", false),
                "refresh": endpoint("POST", "/auth/refresh", "Refresh JWT access token", false),
                "validate": endpoint("GET", "/auth/validate", "Validate JWT token", false),
            },
            "schools": {
                "list": endpoint("GET", "/schools", "Get all schools", true),
                "create": endpoint("POST", "/schools", "Create new school", true),
                "get": endpoint("GET", "/schools/{id}", "Get school by ID", true),
                "update": endpoint("PUT", "/schools/{id}", "Update school", true),
                "delete": endpoint("DELETE", "/schools/{id}", "Delete school", true),
            },
            "students": {
                "list": endpoint("GET", "/students", "Get all students", true),
                "create": endpoint("POST", "/students", "Create new student", true),
                "get": endpoint("GET", "/students/{id}", "Get student by ID", true),
                "update": endpoint("PUT", "/students/{id}", "Update student", true),
                "delete": endpoint("DELETE", "/students/{id}", "Delete student", true),
                "by_school": endpoint("GET", "/students/school/{school_id}", "Get students by school ID", true),
            },
        },
        "authentication": {
            "type": "Bearer Token (JWT)",
            "header": "Authorization: Bearer <token>",
            "description": "Include JWT token in Authorization header for protected endpoints",
        },
    })
}
