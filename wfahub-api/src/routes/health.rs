/// Health check endpoint
///
/// Provides a simple health check endpoint that verifies:
/// - The server is running
/// - Database connectivity
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "connections": { "active": 1, "idle": 4 }
/// }
/// ```
///
/// A degraded service answers 503 with the same body so load balancers can
/// take it out of rotation.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use wfahub_shared::db::pool::{get_pool_stats, health_check as probe_database};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    pub connections: ConnectionCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub active: usize,
    pub idle: usize,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connected = match probe_database(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let stats = get_pool_stats(&state.db);
    let (status, code) = if connected {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if connected { "connected" } else { "disconnected" }.to_string(),
            connections: ConnectionCounts {
                active: stats.active_connections,
                idle: stats.idle_connections,
            },
        }),
    )
}
