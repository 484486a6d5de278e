//! Deliveries service: `/deliveries` REST surface. `GET /deliveries/{id}` is
//! cache-aside; tracking-number and filtered listings always hit the store.

pub mod model;
pub mod store;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheKey, SharedCache, read_through};
use crate::services::{ServiceError, ServiceHealth, ServiceStatus, ValidatedJson};
use model::{
    CreateDelivery, DELIVERY_NOT_FOUND, Delivery, DeliveryDeleted, DeliveryFilter, UpdateDelivery,
    tracking_number,
};
pub use store::{DeliveryStore, MemoryDeliveryStore, PgDeliveryStore};

/// Fresh tracking numbers tried before giving up on a collision
const TRACKING_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct DeliveriesState {
    pub store: Arc<dyn DeliveryStore>,
    pub cache: SharedCache<Delivery>,
}

pub fn router(state: DeliveriesState) -> Router {
    Router::new()
        .route("/deliveries", get(list_deliveries).post(create_delivery))
        .route("/deliveries/health", get(health))
        .route("/deliveries/status/service", get(status))
        .route("/deliveries/tracking/{tracking_number}", get(get_by_tracking))
        .route(
            "/deliveries/{id}",
            get(get_delivery).put(update_delivery).delete(delete_delivery),
        )
        .with_state(state)
}

async fn list_deliveries(
    State(state): State<DeliveriesState>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<Vec<Delivery>>, ServiceError> {
    Ok(Json(state.store.list(filter.order_id).await?))
}

async fn create_delivery(
    State(state): State<DeliveriesState>,
    ValidatedJson(body): ValidatedJson<CreateDelivery>,
) -> Result<(StatusCode, Json<Delivery>), ServiceError> {
    let mut new = body.into_new(Utc::now())?;

    let mut attempt = 1;
    let delivery = loop {
        match state.store.create(new.clone()).await {
            Err(ServiceError::Duplicate(reason)) if attempt < TRACKING_ATTEMPTS => {
                warn!(tracking_number = %new.tracking_number, reason, "Tracking number collision, regenerating");
                new.tracking_number = tracking_number(Utc::now());
                attempt += 1;
            }
            result => break result?,
        }
    };

    state.cache.invalidate(&CacheKey::delivery(delivery.id)).await?;
    info!(
        delivery_id = delivery.id,
        order_id = delivery.order_id,
        tracking_number = %delivery.tracking_number,
        "Delivery created"
    );
    Ok((StatusCode::CREATED, Json(delivery)))
}

async fn get_delivery(
    State(state): State<DeliveriesState>,
    Path(id): Path<i64>,
) -> Result<Json<Delivery>, ServiceError> {
    read_through(state.cache.as_ref(), CacheKey::delivery(id), || state.store.get(id))
        .await?
        .map(Json)
        .ok_or(ServiceError::NotFound(DELIVERY_NOT_FOUND))
}

async fn get_by_tracking(
    State(state): State<DeliveriesState>,
    Path(tracking_number): Path<String>,
) -> Result<Json<Delivery>, ServiceError> {
    state
        .store
        .find_by_tracking(&tracking_number)
        .await?
        .map(Json)
        .ok_or(ServiceError::NotFound(DELIVERY_NOT_FOUND))
}

async fn update_delivery(
    State(state): State<DeliveriesState>,
    Path(id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateDelivery>,
) -> Result<Json<Delivery>, ServiceError> {
    let changes = body.normalized()?;
    // Rules are checked against the system-of-record, never the cache
    let mut delivery = state
        .store
        .get(id)
        .await?
        .ok_or(ServiceError::NotFound(DELIVERY_NOT_FOUND))?;
    let previous = delivery.status;
    delivery.apply(changes, Utc::now())?;

    let delivery = state
        .store
        .save(&delivery)
        .await?
        .ok_or(ServiceError::NotFound(DELIVERY_NOT_FOUND))?;
    state.cache.invalidate(&CacheKey::delivery(id)).await?;
    if previous != delivery.status {
        info!(delivery_id = id, from = %previous, to = %delivery.status, "Delivery status changed");
    }
    Ok(Json(delivery))
}

async fn delete_delivery(
    State(state): State<DeliveriesState>,
    Path(id): Path<i64>,
) -> Result<Json<DeliveryDeleted>, ServiceError> {
    let delivery = state
        .store
        .delete(id)
        .await?
        .ok_or(ServiceError::NotFound(DELIVERY_NOT_FOUND))?;
    state.cache.invalidate(&CacheKey::delivery(id)).await?;
    Ok(Json(DeliveryDeleted {
        message: "Delivery deleted",
        deleted_delivery: delivery,
    }))
}

async fn health(State(state): State<DeliveriesState>) -> Result<Json<ServiceHealth>, ServiceError> {
    state.store.ping().await?;
    Ok(ServiceHealth::ok("Delivery Service"))
}

async fn status() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "Delivery service is running",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySnapshotCache;
    use crate::clock::SystemClock;
    use crate::services::test_support::spawn;
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn start() -> String {
        let state = DeliveriesState {
            store: Arc::new(MemoryDeliveryStore::new()),
            cache: Arc::new(MemorySnapshotCache::new(
                64,
                Duration::from_secs(300),
                SystemClock::shared(),
            )),
        };
        spawn(router(state)).await
    }

    async fn create(client: &reqwest::Client, base: &str) -> Value {
        let response = client
            .post(format!("{base}/deliveries"))
            .json(&json!({"order_id": 1, "address": "123 Main St", "status": "pending"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_generates_tracking_and_eta() {
        let base = start().await;
        let delivery = create(&reqwest::Client::new(), &base).await;

        let tracking = delivery["tracking_number"].as_str().unwrap();
        assert!(tracking.starts_with("TRK"));
        assert!(tracking[3..].chars().all(|c| c.is_ascii_digit()));
        assert!(delivery["estimated_delivery_date"].is_string());
        assert!(delivery["actual_delivery_date"].is_null());
        assert_eq!(delivery["status"], "pending");
    }

    #[tokio::test]
    async fn test_create_requires_order_and_address() {
        let base = start().await;
        let response = reqwest::Client::new()
            .post(format!("{base}/deliveries"))
            .json(&json!({"order_id": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "order_id and address are required");
    }

    #[tokio::test]
    async fn test_delivered_then_in_transit_keeps_actual_date() {
        let base = start().await;
        let client = reqwest::Client::new();
        let delivery = create(&client, &base).await;
        let url = format!("{base}/deliveries/{}", delivery["id"]);

        // Warm the cache so the update must invalidate it
        client.get(&url).send().await.unwrap();

        let delivered: Value = client
            .put(&url)
            .json(&json!({"status": "delivered"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let stamped = delivered["actual_delivery_date"].clone();
        assert!(stamped.is_string());

        let rejected = client
            .put(&url)
            .json(&json!({"status": "in_transit"}))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), 400);

        let current: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(current["status"], "delivered");
        assert_eq!(current["actual_delivery_date"], stamped);
    }

    #[tokio::test]
    async fn test_tracking_lookup_and_filter() {
        let base = start().await;
        let client = reqwest::Client::new();
        let delivery = create(&client, &base).await;
        let tracking = delivery["tracking_number"].as_str().unwrap();

        let found: Value = client
            .get(format!("{base}/deliveries/tracking/{tracking}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(found["id"], delivery["id"]);

        let missing = client
            .get(format!("{base}/deliveries/tracking/TRK0"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let none: Vec<Value> = client
            .get(format!("{base}/deliveries?order_id=99"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_status_route() {
        let base = start().await;
        let client = reqwest::Client::new();
        let delivery = create(&client, &base).await;

        let deleted: Value = client
            .delete(format!("{base}/deliveries/{}", delivery["id"]))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(deleted["message"], "Delivery deleted");
        assert_eq!(deleted["deletedDelivery"]["id"], delivery["id"]);

        let status: Value = client
            .get(format!("{base}/deliveries/status/service"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "Delivery service is running");
    }
}
