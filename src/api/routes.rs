//! Router assembly: binds each route to its pipeline
//!
//! Stage order, outermost first: CORS, request logging, rate limiting,
//! authentication (protected routes only), then breaker-wrapped forwarding.

use axum::{
    response::IntoResponse,
    routing::{get, MethodRouter},
    Extension, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::api::handlers;
use crate::gateway::router::Route;
use crate::middleware::{AuthLayer, CorsLayer, RateLimitLayer};
use crate::AppState;

/// Build the gateway router
pub fn create_router(state: Arc<AppState>) -> Router {
    // The wildcard needs a non-empty tail, so the bare prefix is bound separately
    let auth_routes = bind(
        Router::new()
            .route("/auth", collection())
            .route("/auth/", collection())
            .route("/auth/*path", collection()),
        Route::auth(),
        &state,
    );

    let school_routes = bind(
        Router::new()
            .route("/schools", collection())
            .route("/schools/:id", item()),
        Route::schools(),
        &state,
    );

    let student_routes = bind(
        Router::new()
            .route("/students", collection())
            .route("/students/:id", item())
            .route(
                "/students/school/:school_id",
                get(handlers::forward).fallback(handlers::method_not_allowed),
            ),
        Route::students(),
        &state,
    );

    // Trace wraps the response body, map it back so the CORS stage sees a plain Response
    let pipeline = ServiceBuilder::new()
        .layer(CorsLayer)
        .map_response(IntoResponse::into_response)
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(RateLimitLayer::new());

    Router::new()
        .route("/", get(handlers::docs).fallback(handlers::method_not_allowed))
        .route("/docs", get(handlers::docs).fallback(handlers::method_not_allowed))
        .route("/health", get(handlers::health).fallback(handlers::method_not_allowed))
        .merge(auth_routes)
        .merge(school_routes)
        .merge(student_routes)
        .fallback(handlers::not_found)
        .layer(pipeline)
        .with_state(state)
}

/// `GET` and `POST`
fn collection() -> MethodRouter<Arc<AppState>> {
    get(handlers::forward)
        .post(handlers::forward)
        .fallback(handlers::method_not_allowed)
}

/// `GET`, `PUT` and `DELETE` on a single record
fn item() -> MethodRouter<Arc<AppState>> {
    get(handlers::forward)
        .put(handlers::forward)
        .delete(handlers::forward)
        .fallback(handlers::method_not_allowed)
}

/// Attach the route binding, and the auth gate when the route is protected
fn bind(routes: Router<Arc<AppState>>, route: Route, state: &AppState) -> Router<Arc<AppState>> {
    let protected = route.protected;
    let routes = routes.layer(Extension(Arc::new(route)));
    if protected {
        routes.route_layer(AuthLayer::new(state.auth_gate.clone()))
    } else {
        routes
    }
}
