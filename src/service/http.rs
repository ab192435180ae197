//! HTTP status service.
//!
//! # Responsibilities
//! - Create Axum Router with health and status handlers
//! - Wire up middleware (request ID, tracing, timeout, in-flight limit)
//! - Bind and serve until shutdown, then drain within the deadline
//!
//! # Routes
//! - `GET /health`: liveness, always `{"status":"ok"}`
//! - `GET /status`: name, version, uptime and request count; bearer key
//!   required when `CORE_ADMIN_API_KEY` is set
//! - anything else: `404`

use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{CoreConfig, ListenerConfig, ServiceKind, TimeoutConfig};
use crate::lifecycle::{signals, Shutdown};
use crate::net::bind_tcp;
use crate::observability::metrics;
use crate::service::{Service, ServiceError};

const X_REQUEST_ID: &str = "x-request-id";

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub service: String,
    pub kind: ServiceKind,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub requests_served: u64,
}

/// Shared state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StatusState>,
}

struct StatusState {
    name: String,
    started: Instant,
    requests: AtomicU64,
    in_flight: Arc<Semaphore>,
    api_key: Option<String>,
}

impl AppState {
    fn new(name: String, max_in_flight: usize, api_key: Option<String>) -> Self {
        Self {
            inner: Arc::new(StatusState {
                name,
                started: Instant::now(),
                requests: AtomicU64::new(0),
                in_flight: Arc::new(Semaphore::new(max_in_flight.clamp(1, Semaphore::MAX_PERMITS))),
                api_key,
            }),
        }
    }

    fn report(&self) -> StatusReport {
        StatusReport {
            service: self.inner.name.clone(),
            kind: ServiceKind::Http,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: self.inner.started.elapsed().as_secs(),
            requests_served: self.inner.requests.load(Ordering::Relaxed),
        }
    }
}

/// HTTP service answering health and status requests.
pub struct HttpService {
    name: String,
    listener: ListenerConfig,
    timeouts: TimeoutConfig,
    api_key: Option<String>,
    shutdown: Shutdown,
}

impl HttpService {
    /// Create a new HTTP service from validated configuration.
    pub fn new(config: &CoreConfig, shutdown: Shutdown) -> Self {
        Self {
            name: config.service.name.clone(),
            listener: config.listener.clone(),
            timeouts: config.timeouts.clone(),
            api_key: config.admin.api_key.clone(),
            shutdown,
        }
    }

    /// Handle that stops this service when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let state = AppState::new(
            self.name.clone(),
            self.listener.max_connections,
            self.api_key.clone(),
        );

        let protected = Router::new()
            .route("/status", get(status))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

        #[allow(deprecated)]
        let timeout = TimeoutLayer::new(Duration::from_secs(self.timeouts.request_secs));

        Router::new()
            .route("/health", get(health))
            .merge(protected)
            .fallback(not_found)
            .layer(middleware::from_fn_with_state(state.clone(), track_requests))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(timeout),
            )
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> Result<(), ServiceError> {
        let listener = bind_tcp(self.listener.bind_address).await?;
        tracing::info!(
            service = %self.name,
            address = %self.listener.bind_address,
            max_in_flight = self.listener.max_connections,
            "HTTP service starting"
        );

        let signal_task = signals::shutdown_on_signal(self.shutdown.clone());
        let graceful = {
            let shutdown = self.shutdown.clone();
            async move { shutdown.wait().await }
        };
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(graceful)
            .into_future();

        let drain_deadline = {
            let shutdown = self.shutdown.clone();
            let grace = Duration::from_secs(self.timeouts.shutdown_secs);
            async move {
                shutdown.wait().await;
                tokio::time::sleep(grace).await;
            }
        };

        let result = tokio::select! {
            served = server => served.map_err(ServiceError::from),
            _ = drain_deadline => {
                tracing::warn!(
                    grace_secs = self.timeouts.shutdown_secs,
                    "In-flight requests did not finish before the shutdown deadline"
                );
                Ok(())
            }
        };

        signal_task.abort();
        tracing::info!(service = %self.name, "HTTP service stopped");
        result
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.report())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

/// Reject `/status` requests without the configured bearer key.
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.inner.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented.is_some_and(|key| keys_match(key, expected)) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected request without valid API key");
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Compare keys without exiting at the first differing byte.
fn keys_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Enforce the in-flight bound, count requests and record metrics.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Ok(_permit) = Arc::clone(&state.inner.in_flight).try_acquire_owned() else {
        tracing::warn!(request_id = %request_id, path = %path, "Too many requests in flight");
        metrics::record_request(method.as_str(), 503, start);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "too many requests in flight" })),
        )
            .into_response();
    };

    let response = next.run(request).await;
    state.inner.requests.fetch_add(1, Ordering::Relaxed);

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start);
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use axum::body::Body;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    fn service(extra: &[(&str, &str)]) -> HttpService {
        let mut pairs = vec![("CORE_BIND_ADDRESS", "127.0.0.1:0")];
        pairs.extend_from_slice(extra);
        let config = CoreConfig::from_env(&Environment::from_pairs(pairs)).unwrap();
        HttpService::new(&config, Shutdown::new())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok_with_request_id() {
        let response = service(&[]).router().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(body_json(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = service(&[]).router().oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not found");
    }

    #[tokio::test]
    async fn status_is_open_without_api_key() {
        let router = service(&[("CORE_SERVICE_NAME", "probe")]).router();
        let response = router.oneshot(get("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "probe");
        assert_eq!(body["kind"], "http");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn status_requires_bearer_key_when_configured() {
        let router = service(&[("CORE_ADMIN_API_KEY", "s3cret")]).router();

        let response = router.clone().oneshot(get("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = axum::http::Request::builder()
            .uri("/status")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            router.clone().oneshot(wrong).await.unwrap().status(),
            StatusCode::UNAUTHORIZED
        );

        let right = axum::http::Request::builder()
            .uri("/status")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(router.clone().oneshot(right).await.unwrap().status(), StatusCode::OK);

        // Health stays public.
        assert_eq!(router.oneshot(get("/health")).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_counts_completed_requests() {
        let router = service(&[]).router();
        for _ in 0..3 {
            router.clone().oneshot(get("/health")).await.unwrap();
        }
        let body = body_json(router.oneshot(get("/status")).await.unwrap()).await;
        assert_eq!(body["requests_served"], 3);
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cre", "s3cret"));
        assert!(!keys_match("s3creT", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }

    #[tokio::test]
    async fn excess_in_flight_requests_get_503() {
        let svc = service(&[("CORE_MAX_CONNECTIONS", "1")]);
        let state = AppState::new(svc.name.clone(), svc.listener.max_connections, None);

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let hold = {
            let entered = entered.clone();
            let release = release.clone();
            move || {
                let entered = entered.clone();
                let release = release.clone();
                async move {
                    entered.notify_one();
                    release.notified().await;
                    "done"
                }
            }
        };
        let router = Router::new()
            .route("/hold", axum::routing::get(hold))
            .layer(middleware::from_fn_with_state(state.clone(), track_requests))
            .with_state(state.clone());

        let first = tokio::spawn(router.clone().oneshot(get("/hold")));
        entered.notified().await;

        let rejected = router.clone().oneshot(get("/hold")).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(rejected).await["error"], "too many requests in flight");

        release.notify_one();
        let held = tokio::time::timeout(Duration::from_secs(2), first)
            .await
            .expect("held request should finish")
            .unwrap()
            .unwrap();
        assert_eq!(held.status(), StatusCode::OK);

        // The permit is back once the first request completes.
        release.notify_one();
        let after = router.oneshot(get("/hold")).await.unwrap();
        assert_eq!(after.status(), StatusCode::OK);

        // Rejected requests are not counted as served.
        assert_eq!(state.report().requests_served, 2);
    }
}
