//! `/orders` routes, forwarded to the Orders service

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;

use super::super::state::AppState;
use super::relay;
use crate::proxy::ProxyRequest;

/// Forwarded verbatim; the Orders service validates it
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub user_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/orders",
    params(("user_id" = Option<i64>, Query, description = "Only orders of this user")),
    responses(
        (status = 200, description = "Orders", content_type = "application/json"),
        (status = 500, description = "Orders service temporarily unavailable")
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrdersQuery>,
) -> Response {
    let mut request = ProxyRequest::get(["orders"]);
    if let Some(user_id) = query.user_id {
        request = request.query("user_id", user_id);
    }
    relay(state.orders.fire(request).await)
}

/// Create an order; with `delivery_address` the response may carry
/// `delivery_info`
#[utoipa::path(
    post,
    path = "/orders",
    responses(
        (status = 201, description = "Order created", content_type = "application/json"),
        (status = 400, description = "Missing user_id or product"),
        (status = 500, description = "Orders service temporarily unavailable")
    ),
    tag = "Orders"
)]
pub async fn create_order(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    relay(state.orders.fire(ProxyRequest::post(["orders"], body)).await)
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", content_type = "application/json"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Orders service temporarily unavailable")
    ),
    tag = "Orders"
)]
pub async fn get_order(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    relay(state.orders.fire(ProxyRequest::get(["orders", id.as_str()])).await)
}

#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Updated order", content_type = "application/json"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Orders service temporarily unavailable")
    ),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    relay(state.orders.fire(ProxyRequest::put(["orders", id.as_str()], body)).await)
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Deleted order", content_type = "application/json"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Orders service temporarily unavailable")
    ),
    tag = "Orders"
)]
pub async fn delete_order(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    relay(state.orders.fire(ProxyRequest::delete(["orders", id.as_str()])).await)
}
