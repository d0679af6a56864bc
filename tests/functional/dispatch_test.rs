//! Functional tests for the full request pipeline

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use skool_gateway::backend::{BackendDescriptor, BackendRegistry};
use skool_gateway::gateway::{dispatcher::Dispatcher, proxy::ProxyForwarder, router::Route};
use skool_gateway::{api::routes::create_router, config::Settings, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::http::HeaderName;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Backends {
    auth: MockServer,
    school: MockServer,
    student: MockServer,
}

impl Backends {
    async fn start() -> Self {
        let backends = Self {
            auth: MockServer::start().await,
            school: MockServer::start().await,
            student: MockServer::start().await,
        };

        Mock::given(method("GET"))
            .and(path("/validate"))
            .and(wiremock::matchers::header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Token is valid",
                "data": {"user_id": "1", "email": "admin@school.test"}
            })))
            .mount(&backends.auth)
            .await;

        backends
    }

    fn app(&self) -> Router {
        let mut settings = Settings::default();
        settings.services.auth_url = self.auth.uri();
        settings.services.school_url = self.school.uri();
        settings.services.student_url = self.student.uri();
        settings.timeouts.health_secs = 2;

        create_router(Arc::new(AppState::from_settings(&settings).unwrap()))
    }
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn authorized(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, "Bearer good")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_cors(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let backends = Backends::start().await;
    Mock::given(method("OPTIONS"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backends.school)
        .await;

    let response = backends
        .app()
        .oneshot(request(Method::OPTIONS, "/schools"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let backends = Backends::start().await;
    let response = backends
        .app()
        .oneshot(request(Method::GET, "/courses"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({"error": "NOT_FOUND", "message": "Endpoint not found"})
    );
}

#[tokio::test]
async fn test_unsupported_method_is_rejected() {
    let backends = Backends::start().await;
    let response = backends
        .app()
        .oneshot(request(Method::DELETE, "/auth/login"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await["error"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_auth_routes_strip_prefix_without_token() {
    let backends = Backends::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string(r#"{"email":"a@b.c","password":"x"}"#))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Login successful"})),
        )
        .expect(1)
        .mount(&backends.auth)
        .await;

    let response = backends
        .app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"a@b.c","password":"x"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert_eq!(json_body(response).await["message"], "Login successful");
}

#[tokio::test]
async fn test_bare_auth_prefix_reaches_identity_root() {
    let backends = Backends::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("root"))
        .expect(2)
        .mount(&backends.auth)
        .await;

    let app = backends.app();
    for uri in ["/auth/", "/auth"] {
        let response = app.clone().oneshot(request(Method::GET, uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"root");
    }
}

#[tokio::test]
async fn test_repeated_headers_survive_both_directions() {
    let backends = Backends::start().await;
    Mock::given(method("GET"))
        .and(path("/schools"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "a=1")
                .append_header("set-cookie", "b=2"),
        )
        .expect(1)
        .mount(&backends.school)
        .await;

    let response = backends
        .app()
        .oneshot(
            Request::builder()
                .uri("/schools")
                .header(header::AUTHORIZATION, "Bearer good")
                .header("x-multi", "one")
                .header("x-multi", "two")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, ["a=1", "b=2"]);

    let received = backends.school.received_requests().await.unwrap();
    let forwarded: Vec<_> = received
        .iter()
        .find(|r| r.url.path() == "/schools")
        .unwrap()
        .headers[&HeaderName::from("x-multi")]
        .iter()
        .map(|v| v.as_str().to_string())
        .collect();
    assert_eq!(forwarded, ["one", "two"]);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let backends = Backends::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backends.school)
        .await;

    let response = backends
        .app()
        .oneshot(request(Method::GET, "/schools"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_cors(&response);
    assert_eq!(json_body(response).await["error"], "MISSING_TOKEN");
}

#[tokio::test]
async fn test_protected_route_is_forwarded_unstripped() {
    let backends = Backends::start().await;
    Mock::given(method("GET"))
        .and(path("/students/school/3"))
        .and(query_param("active", "true"))
        .and(wiremock::matchers::header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&backends.student)
        .await;

    let response = backends
        .app()
        .oneshot(authorized(Method::GET, "/students/school/3?active=true"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"data": []}));
}

#[tokio::test]
async fn test_upstream_client_error_is_relayed() {
    let backends = Backends::start().await;
    Mock::given(method("PUT"))
        .and(path("/schools/77"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "NOT_FOUND", "message": "School not found"})),
        )
        .mount(&backends.school)
        .await;

    let response = backends
        .app()
        .oneshot(authorized(Method::PUT, "/schools/77"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "School not found");
}

#[tokio::test]
async fn test_failing_backend_opens_its_breaker() {
    let backends = Backends::start().await;
    Mock::given(method("GET"))
        .and(path("/schools"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&backends.school)
        .await;
    Mock::given(method("GET"))
        .and(path("/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&backends.student)
        .await;

    let app = backends.app();

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(authorized(Method::GET, "/schools"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "SERVICE_ERROR");
    }

    let response = app
        .clone()
        .oneshot(authorized(Method::GET, "/schools"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_cors(&response);
    assert_eq!(
        json_body(response).await,
        json!({
            "error": "CIRCUIT_BREAKER_OPEN",
            "message": "Service is temporarily unavailable due to circuit breaker"
        })
    );

    // Other backends keep their own breakers
    let response = app
        .oneshot(authorized(Method::GET, "/students"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let backends = Backends::start().await;
    let mut settings = Settings::default();
    settings.services.auth_url = backends.auth.uri();
    settings.services.student_url = backends.student.uri();
    let closed = MockServer::start().await;
    settings.services.school_url = closed.uri();
    drop(closed);
    let app = create_router(Arc::new(AppState::from_settings(&settings).unwrap()));

    let response = app
        .oneshot(authorized(Method::GET, "/schools"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        json_body(response).await,
        json!({"error": "SERVICE_UNAVAILABLE", "message": "Target service is unavailable"})
    );
}

#[tokio::test]
async fn test_docs_endpoints() {
    let backends = Backends::start().await;
    let app = backends.app();

    for uri in ["/docs", "/"] {
        let response = app.clone().oneshot(request(Method::GET, uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "API Documentation");
        assert_eq!(body["data"]["title"], "School Management API Gateway");
        assert_eq!(body["data"]["endpoints"]["schools"]["list"]["auth"], "required");
    }
}

#[tokio::test]
async fn test_health_reports_partial_outage() {
    let backends = Backends::start().await;
    for server in [&backends.auth, &backends.school] {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&backends.student)
        .await;

    let response = backends
        .app()
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "PARTIAL_OUTAGE");
    assert_eq!(body["message"], "Some services are unhealthy");
    assert_eq!(body["data"]["student"]["status"], "unhealthy");
    assert_eq!(body["data"]["school"]["status"], "healthy");
    assert_eq!(body["data"]["school"]["circuit_breaker"], "CLOSED");
    assert_eq!(body["data"]["gateway"]["status"], "healthy");
}

#[tokio::test]
async fn test_health_all_healthy() {
    let backends = Backends::start().await;
    for server in [&backends.auth, &backends.school, &backends.student] {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    let response = backends
        .app()
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "All services are healthy");
    assert_eq!(body["data"].as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn test_registered_backend_is_dispatchable() {
    let billing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("paid"))
        .expect(1)
        .mount(&billing)
        .await;

    let settings = Settings::default();
    let registry = Arc::new(BackendRegistry::new(
        BackendDescriptor::from_services(&settings.services),
        &settings.circuit_breaker,
    ));
    registry.register(BackendDescriptor::new("billing", billing.uri()));

    let dispatcher = Dispatcher::new(
        registry.clone(),
        ProxyForwarder::new(Duration::from_secs(5)).unwrap(),
        settings.limits.max_body_bytes,
    );
    let response = dispatcher
        .dispatch(
            &Route::new("billing").strip_prefix("/billing"),
            request(Method::GET, "/billing/invoices"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"paid");
    assert_eq!(registry.breaker("billing").max_failures(), 3);
}

#[tokio::test]
async fn test_unregistered_route_target_is_internal_error() {
    let settings = Settings::default();
    let registry = Arc::new(BackendRegistry::new(Vec::new(), &settings.circuit_breaker));
    let dispatcher = Dispatcher::new(
        registry,
        ProxyForwarder::new(Duration::from_secs(5)).unwrap(),
        settings.limits.max_body_bytes,
    );

    match dispatcher
        .dispatch(&Route::new("billing"), request(Method::GET, "/invoices"))
        .await
    {
        Err(err) => assert_eq!(err.code(), "INTERNAL_ERROR"),
        Ok(response) => panic!("unexpected status {}", response.status()),
    }
}
