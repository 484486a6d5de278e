//! `/users` routes, forwarded to the Users service

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::Value;

use super::super::state::AppState;
use super::relay;
use crate::proxy::ProxyRequest;

/// List users
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", content_type = "application/json"),
        (status = 500, description = "Users service temporarily unavailable")
    ),
    tag = "Users"
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> Response {
    relay(state.users.fire(ProxyRequest::get(["users"])).await)
}

/// Create a user
#[utoipa::path(
    post,
    path = "/users",
    responses(
        (status = 201, description = "User created", content_type = "application/json"),
        (status = 400, description = "Missing field or duplicate email"),
        (status = 500, description = "Users service temporarily unavailable")
    ),
    tag = "Users"
)]
pub async fn create_user(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    relay(state.users.fire(ProxyRequest::post(["users"], body)).await)
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", content_type = "application/json"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Users service temporarily unavailable")
    ),
    tag = "Users"
)]
pub async fn get_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    relay(state.users.fire(ProxyRequest::get(["users", id.as_str()])).await)
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", content_type = "application/json"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Users service temporarily unavailable")
    ),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    relay(state.users.fire(ProxyRequest::put(["users", id.as_str()], body)).await)
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted user", content_type = "application/json"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Users service temporarily unavailable")
    ),
    tag = "Users"
)]
pub async fn delete_user(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    relay(state.users.fire(ProxyRequest::delete(["users", id.as_str()])).await)
}
