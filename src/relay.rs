use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router, middleware};
use reqwest::header::ACCEPT;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::RELAY_RESULTS_PATH;
use crate::config::RelayConfig;

/// Shared state for the relay handlers.
pub struct RelayState {
    pub http: reqwest::Client,
    pub upstream_url: String,
}

impl RelayState {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            upstream_url: config.upstream_url.clone(),
        })
    }
}

/// Router for the relay: results pass-through plus a health check.
///
/// CORS is fully permissive, which also answers browser preflights.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route(RELAY_RESULTS_PATH, get(relay_results))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// GET /api/results - forward to the upstream feed and relay its JSON verbatim
pub async fn relay_results(
    State(state): State<Arc<RelayState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    tracing::info!("Fetching results from upstream feed");
    match fetch_upstream(&state).await {
        Ok(body) => Ok(Json(body)),
        Err(e) => {
            tracing::error!("Failed to fetch upstream results: {e:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": format!("{e:#}"),
                    "details": "Failed to fetch results from external API",
                })),
            ))
        }
    }
}

async fn fetch_upstream(state: &RelayState) -> Result<Value> {
    let resp = state
        .http
        .get(&state.upstream_url)
        .header(ACCEPT, "application/json")
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("API returned status {}", status.as_u16());
    }
    let body = resp.json::<Value>().await?;
    Ok(body)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Logging middleware
async fn logging_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::serve;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn relay_to(upstream_url: String) -> Router {
        let state = RelayState::new(&RelayConfig {
            upstream_url,
            request_timeout_ms: 2_000,
            ..RelayConfig::default()
        })
        .unwrap();
        router(Arc::new(state))
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_results() -> Request<Body> {
        Request::builder()
            .uri(RELAY_RESULTS_PATH)
            .header("origin", "https://app.example")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn relays_upstream_body_verbatim() {
        let payload = json!({ "results": [{ "id": "1", "roll": 0, "color": 0, "created_at": "2024-01-01T10:50:00Z" }] });
        let expected = payload.clone();
        let base = serve(Router::new().route("/api.php", get(move || async move { Json(payload) }))).await;

        let resp = relay_to(format!("{base}/api.php")).oneshot(get_results()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        assert_eq!(body_json(resp).await, expected);
    }

    #[tokio::test]
    async fn upstream_error_status_becomes_500_envelope() {
        let base = serve(Router::new().route(
            "/api.php",
            get(|| async { (StatusCode::BAD_GATEWAY, "nope") }),
        ))
        .await;

        let resp = relay_to(format!("{base}/api.php")).oneshot(get_results()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "API returned status 502");
        assert_eq!(body["details"], "Failed to fetch results from external API");
    }

    #[tokio::test]
    async fn unreachable_upstream_becomes_500_envelope() {
        let resp = relay_to("http://127.0.0.1:1/api.php".to_string())
            .oneshot(get_results())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn preflight_is_answered() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri(RELAY_RESULTS_PATH)
            .header("origin", "https://app.example")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let resp = relay_to("http://127.0.0.1:1/api.php".to_string())
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("access-control-allow-methods"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = relay_to("http://127.0.0.1:1/api.php".to_string())
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
