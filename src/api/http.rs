//! HTTP server setup with Axum

use std::sync::Arc;
use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use super::websocket::{ws_handler, RelayState};

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<RelayState>) -> Router {
    // Dashboards are served from the build master's own origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    clients: usize,
    urls: usize,
    timestamp: i64,
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<RelayState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        clients: state.client_count(),
        urls: state.url_count(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_health_check() {
        let state = Arc::new(RelayState::new(RelayConfig::default()));
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["clients"], 0);
        assert!(health["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let state = Arc::new(RelayState::new(RelayConfig::default()));
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
