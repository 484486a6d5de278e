//! Users service: `/users` REST surface over the user table with a
//! cache-aside read path for `GET /users/{id}`.

pub mod model;
pub mod store;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheKey, SharedCache, read_through};
use crate::services::{ServiceError, ServiceHealth, ServiceStatus, ValidatedJson};
use model::{CreateUser, USER_NOT_FOUND, UpdateUser, User, UserDeleted};
pub use store::{MemoryUserStore, PgUserStore, UserStore};

#[derive(Debug, Clone)]
pub struct UsersState {
    pub store: Arc<dyn UserStore>,
    pub cache: SharedCache<User>,
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/health", get(health))
        .route("/users/status", get(status))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(state)
}

async fn list_users(State(state): State<UsersState>) -> Result<Json<Vec<User>>, ServiceError> {
    Ok(Json(state.store.list().await?))
}

async fn create_user(
    State(state): State<UsersState>,
    ValidatedJson(body): ValidatedJson<CreateUser>,
) -> Result<(StatusCode, Json<User>), ServiceError> {
    let user = state.store.create(body.into_new()).await?;
    state.cache.invalidate(&CacheKey::user(user.id)).await?;
    info!(user_id = user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<UsersState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ServiceError> {
    read_through(state.cache.as_ref(), CacheKey::user(id), || state.store.get(id))
        .await?
        .map(Json)
        .ok_or(ServiceError::NotFound(USER_NOT_FOUND))
}

async fn update_user(
    State(state): State<UsersState>,
    Path(id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateUser>,
) -> Result<Json<User>, ServiceError> {
    let user = state
        .store
        .update(id, body.normalized()?)
        .await?
        .ok_or(ServiceError::NotFound(USER_NOT_FOUND))?;
    state.cache.invalidate(&CacheKey::user(id)).await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<UsersState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDeleted>, ServiceError> {
    let user = state
        .store
        .delete(id)
        .await?
        .ok_or(ServiceError::NotFound(USER_NOT_FOUND))?;
    state.cache.invalidate(&CacheKey::user(id)).await?;
    info!(user_id = id, "User deleted");
    Ok(Json(UserDeleted {
        message: "User deleted",
        deleted_user: user,
    }))
}

async fn health(State(state): State<UsersState>) -> Result<Json<ServiceHealth>, ServiceError> {
    state.store.ping().await?;
    Ok(ServiceHealth::ok("Users Service"))
}

async fn status() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "Users service is running",
    })
}
