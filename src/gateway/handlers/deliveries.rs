//! `/deliveries` routes, forwarded to the Deliveries service

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;

use super::super::state::AppState;
use super::relay;
use crate::proxy::ProxyRequest;

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    pub order_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/deliveries",
    params(("order_id" = Option<i64>, Query, description = "Only deliveries of this order")),
    responses(
        (status = 200, description = "Deliveries", content_type = "application/json"),
        (status = 500, description = "Delivery service temporarily unavailable")
    ),
    tag = "Deliveries"
)]
pub async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeliveriesQuery>,
) -> Response {
    let mut request = ProxyRequest::get(["deliveries"]);
    if let Some(order_id) = query.order_id {
        request = request.query("order_id", order_id);
    }
    relay(state.deliveries.fire(request).await)
}

#[utoipa::path(
    post,
    path = "/deliveries",
    responses(
        (status = 201, description = "Delivery created", content_type = "application/json"),
        (status = 400, description = "Missing order_id or address, or invalid status"),
        (status = 500, description = "Delivery service temporarily unavailable")
    ),
    tag = "Deliveries"
)]
pub async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    relay(state.deliveries.fire(ProxyRequest::post(["deliveries"], body)).await)
}

#[utoipa::path(
    get,
    path = "/deliveries/tracking/{tracking_number}",
    params(("tracking_number" = String, Path, description = "Tracking number, e.g. TRK17290000000001234")),
    responses(
        (status = 200, description = "Delivery", content_type = "application/json"),
        (status = 404, description = "Delivery not found"),
        (status = 500, description = "Delivery service temporarily unavailable")
    ),
    tag = "Deliveries"
)]
pub async fn track_delivery(
    State(state): State<Arc<AppState>>,
    Path(tracking_number): Path<String>,
) -> Response {
    let request = ProxyRequest::get(["deliveries", "tracking", tracking_number.as_str()]);
    relay(state.deliveries.fire(request).await)
}

#[utoipa::path(
    get,
    path = "/deliveries/{id}",
    params(("id" = i64, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery", content_type = "application/json"),
        (status = 404, description = "Delivery not found"),
        (status = 500, description = "Delivery service temporarily unavailable")
    ),
    tag = "Deliveries"
)]
pub async fn get_delivery(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    relay(state.deliveries.fire(ProxyRequest::get(["deliveries", id.as_str()])).await)
}

/// Update a delivery. Moving to `delivered` stamps `actual_delivery_date`.
#[utoipa::path(
    put,
    path = "/deliveries/{id}",
    params(("id" = i64, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Updated delivery", content_type = "application/json"),
        (status = 400, description = "Invalid status change"),
        (status = 404, description = "Delivery not found"),
        (status = 500, description = "Delivery service temporarily unavailable")
    ),
    tag = "Deliveries"
)]
pub async fn update_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    relay(state.deliveries.fire(ProxyRequest::put(["deliveries", id.as_str()], body)).await)
}

#[utoipa::path(
    delete,
    path = "/deliveries/{id}",
    params(("id" = i64, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Deleted delivery", content_type = "application/json"),
        (status = 404, description = "Delivery not found"),
        (status = 500, description = "Delivery service temporarily unavailable")
    ),
    tag = "Deliveries"
)]
pub async fn delete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    relay(state.deliveries.fire(ProxyRequest::delete(["deliveries", id.as_str()])).await)
}
