//! `GET /users/{id}/details`: user plus their orders

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::super::state::AppState;
use super::relay;
use crate::proxy::{ProxyRequest, Reply};

#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub user: Value,
    pub orders: Value,
}

/// Either side may be a fallback payload; the merge still answers 200
fn payload(reply: Reply) -> Value {
    match reply {
        Reply::Success { body, .. }
        | Reply::Rejected { body, .. }
        | Reply::NotFound(body)
        | Reply::Fallback(body) => body,
    }
}

/// Aggregate a user and their orders.
///
/// Both lookups run concurrently and are dropped together if the client
/// goes away. A missing user wins over whatever the orders lookup returned.
#[utoipa::path(
    get,
    path = "/users/{id}/details",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "`{user, orders}`; either side may be a fallback payload", content_type = "application/json"),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn user_details(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let user_request = ProxyRequest::get(["users", id.as_str()]);
    let orders_request = ProxyRequest::get(["orders"]).query("user_id", id.as_str());

    let (user, orders) = tokio::join!(
        state.users.fire(user_request),
        state.orders.fire(orders_request)
    );

    match user {
        Reply::NotFound(body) => {
            debug!(user_id = %id, "User not found, orders result discarded");
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
        rejected @ Reply::Rejected { .. } => relay(rejected),
        user => Json(UserDetails {
            user: payload(user),
            orders: payload(orders),
        })
        .into_response(),
    }
}
