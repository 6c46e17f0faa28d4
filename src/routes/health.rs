// src/routes/health.rs
//! API health check endpoints for the station service.
//!
//! `/health` is used by container orchestrators (e.g., Docker, Kubernetes) and
//! CI pipelines to verify that the service is running and able to respond to
//! HTTP requests. `/health/ready` additionally proves a connection scope can
//! be acquired and committed. It is a sibling module in the `routes` directory
//! and follows the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the routes

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::Scopes;

/// JSON response body for the health endpoints.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'static str>,
}

/// Handle `GET /health`.
///
/// Returns a static JSON object indicating the API is reachable. This
/// endpoint does not touch the database.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        database: None,
    })
}

/// Handle `GET /health/ready`.
///
/// Acquires and commits an empty scope; reports 503 if the store is
/// unreachable.
async fn ready(State(scopes): State<Scopes>) -> (StatusCode, Json<HealthResponse>) {
    // ---
    let probe = match scopes.acquire().await {
        Ok(scope) => scope.commit().await,
        Err(e) => Err(e),
    };

    match probe {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                database: Some("ok"),
            }),
        ),
        Err(e) => {
            warn!("Readiness probe failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "not_ready",
                    database: Some("unavailable"),
                }),
            )
        }
    }
}

/// Create a subrouter containing the health routes.
pub fn router() -> Router<Scopes> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}
