//! Health and status handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use super::super::state::AppState;
use crate::resilience::CircuitSnapshot;

#[derive(Debug, Serialize, ToSchema)]
pub struct CircuitReport {
    #[schema(value_type = Object)]
    pub users: CircuitSnapshot,
    #[schema(value_type = Object)]
    pub orders: CircuitSnapshot,
    #[schema(value_type = Object)]
    pub delivery: CircuitSnapshot,
}

/// Gateway health response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "OK")]
    pub status: &'static str,
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    pub circuits: CircuitReport,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Health check endpoint
///
/// Reports every circuit from memory; no downstream service is called, so
/// the answer is always 200.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Circuit state and counters per dependency", body = HealthResponse, content_type = "application/json")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let [users, orders, delivery] = state.snapshots();
    Json(HealthResponse {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
        circuits: CircuitReport {
            users,
            orders,
            delivery,
        },
    })
}

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Gateway is running", body = StatusResponse, content_type = "application/json")
    ),
    tag = "System"
)]
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "API Gateway is running",
    })
}
