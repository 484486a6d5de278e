//! Orders service: `/orders` REST surface, cache-aside reads for
//! `GET /orders/{id}`, and delivery creation on `POST /orders`.

pub mod model;
pub mod orchestrator;
pub mod store;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheKey, SharedCache, read_through};
use crate::resilience::CircuitSnapshot;
use crate::services::{ServiceError, ServiceHealth, ServiceStatus, ValidatedJson};
use model::{CreateOrder, ORDER_NOT_FOUND, Order, OrderCreated, OrderDeleted, OrderFilter, UpdateOrder};
pub use orchestrator::{DeliveryOrchestrator, OrchestrationStats};
pub use store::{MemoryOrderStore, OrderStore, PgOrderStore};

#[derive(Debug, Clone)]
pub struct OrdersState {
    pub store: Arc<dyn OrderStore>,
    pub cache: SharedCache<Order>,
    pub orchestrator: Arc<DeliveryOrchestrator>,
}

pub fn router(state: OrdersState) -> Router {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/health", get(health))
        .route("/orders/status", get(status))
        .route(
            "/orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .with_state(state)
}

async fn list_orders(
    State(state): State<OrdersState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, ServiceError> {
    Ok(Json(state.store.list(filter.user_id).await?))
}

async fn create_order(
    State(state): State<OrdersState>,
    ValidatedJson(body): ValidatedJson<CreateOrder>,
) -> Result<(StatusCode, Json<OrderCreated>), ServiceError> {
    let (new_order, delivery_address) = body.into_parts();
    let order = state.store.create(new_order).await?;
    state.cache.invalidate(&CacheKey::order(order.id)).await?;
    info!(order_id = order.id, user_id = order.user_id, "Order created");

    let delivery_info = match delivery_address {
        Some(address) => state.orchestrator.attach_delivery(order.id, address).await,
        None => None,
    };

    Ok((
        StatusCode::CREATED,
        Json(OrderCreated {
            order,
            delivery_info,
        }),
    ))
}

async fn get_order(
    State(state): State<OrdersState>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ServiceError> {
    read_through(state.cache.as_ref(), CacheKey::order(id), || state.store.get(id))
        .await?
        .map(Json)
        .ok_or(ServiceError::NotFound(ORDER_NOT_FOUND))
}

async fn update_order(
    State(state): State<OrdersState>,
    Path(id): Path<i64>,
    ValidatedJson(body): ValidatedJson<UpdateOrder>,
) -> Result<Json<Order>, ServiceError> {
    let order = state
        .store
        .update(id, body.normalized())
        .await?
        .ok_or(ServiceError::NotFound(ORDER_NOT_FOUND))?;
    state.cache.invalidate(&CacheKey::order(id)).await?;
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<OrdersState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDeleted>, ServiceError> {
    let order = state
        .store
        .delete(id)
        .await?
        .ok_or(ServiceError::NotFound(ORDER_NOT_FOUND))?;
    state.cache.invalidate(&CacheKey::order(id)).await?;
    info!(order_id = id, "Order deleted");
    Ok(Json(OrderDeleted {
        message: "Order deleted",
        deleted_order: order,
    }))
}

/// Liveness plus the state of the Deliveries dependency
#[derive(Debug, Serialize)]
struct OrdersHealth {
    #[serde(flatten)]
    service: ServiceHealth,
    delivery_circuit: CircuitSnapshot,
    orchestration: OrchestrationStats,
}

async fn health(State(state): State<OrdersState>) -> Result<Json<OrdersHealth>, ServiceError> {
    state.store.ping().await?;
    let Json(service) = ServiceHealth::ok("Orders Service");
    Ok(Json(OrdersHealth {
        service,
        delivery_circuit: state.orchestrator.circuit(),
        orchestration: state.orchestrator.stats(),
    }))
}

async fn status() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "Orders service is running",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySnapshotCache;
    use crate::clock::SystemClock;
    use crate::proxy::{Dependency, DependencyProxy};
    use crate::resilience::{CircuitBreakerConfig, CircuitState};
    use crate::services::test_support::spawn;
    use serde_json::{Value, json};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn start(deliveries_url: &str) -> (String, Arc<MemoryOrderStore>, Arc<DeliveryOrchestrator>) {
        let proxy = DependencyProxy::new(
            Dependency::Delivery,
            deliveries_url,
            CircuitBreakerConfig::default(),
            SystemClock::shared(),
        )
        .unwrap();
        let orchestrator = Arc::new(DeliveryOrchestrator::new(Arc::new(proxy)));
        let store = Arc::new(MemoryOrderStore::new());
        let state = OrdersState {
            store: store.clone(),
            cache: Arc::new(MemorySnapshotCache::new(
                64,
                Duration::from_secs(300),
                SystemClock::shared(),
            )),
            orchestrator: orchestrator.clone(),
        };
        (spawn(router(state)).await, store, orchestrator)
    }

    fn book_order() -> Value {
        json!({"user_id": 1, "product": "book", "delivery_address": "123 Main St"})
    }

    #[tokio::test]
    async fn test_create_attaches_delivery_info() {
        let deliveries = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deliveries"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 3,
                "tracking_number": "TRK17290000000000042",
                "estimated_delivery_date": "2026-10-21T09:30:00.000Z"
            })))
            .mount(&deliveries)
            .await;
        let (base, _, _) = start(&deliveries.uri()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/orders"))
            .json(&book_order())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["product"], "book");
        assert_eq!(body["amount"], "0.00");
        assert_eq!(body["status"], "pending");
        assert_eq!(body["delivery_info"]["tracking_number"], "TRK17290000000000042");
        assert!(body.get("delivery_address").is_none());
    }

    #[tokio::test]
    async fn test_create_survives_deliveries_outage() {
        let (base, store, orchestrator) = start("http://127.0.0.1:1").await;
        let client = reqwest::Client::new();

        for _ in 0..2 {
            let response = client
                .post(format!("{base}/orders"))
                .json(&book_order())
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 201);
            let body: Value = response.json().await.unwrap();
            assert!(body.get("delivery_info").is_none());
        }

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        assert_eq!(orchestrator.circuit().state, CircuitState::Open);
        assert_eq!(orchestrator.stats().failed, 2);
    }

    #[tokio::test]
    async fn test_no_address_means_no_delivery_call() {
        let deliveries = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&deliveries)
            .await;
        let (base, _, _) = start(&deliveries.uri()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/orders"))
            .json(&json!({"user_id": 1, "product": "book", "amount": 12.5}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["amount"], "12.50");
        assert!(body.get("delivery_info").is_none());
    }

    #[tokio::test]
    async fn test_list_filter_and_not_found() {
        let (base, _, _) = start("http://127.0.0.1:1").await;
        let client = reqwest::Client::new();
        for (user_id, product) in [(1, "book"), (2, "lamp"), (1, "pen")] {
            client
                .post(format!("{base}/orders"))
                .json(&json!({"user_id": user_id, "product": product}))
                .send()
                .await
                .unwrap();
        }

        let mine: Vec<Value> = client
            .get(format!("{base}/orders?user_id=1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);

        let missing = client.get(format!("{base}/orders/999")).send().await.unwrap();
        assert_eq!(missing.status(), 404);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "Order not found");
    }

    #[tokio::test]
    async fn test_update_invalidates_cached_order() {
        let (base, _, _) = start("http://127.0.0.1:1").await;
        let client = reqwest::Client::new();
        let created: Value = client
            .post(format!("{base}/orders"))
            .json(&json!({"user_id": 1, "product": "book"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let url = format!("{base}/orders/{}", created["id"]);

        client.get(&url).send().await.unwrap();
        client
            .put(&url)
            .json(&json!({"status": "shipped", "product": ""}))
            .send()
            .await
            .unwrap();

        let fresh: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(fresh["status"], "shipped");
        assert_eq!(fresh["product"], "book");
    }

    #[tokio::test]
    async fn test_health_reports_delivery_circuit() {
        let (base, _, _) = start("http://127.0.0.1:1").await;
        let health: Value = reqwest::get(format!("{base}/orders/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(health["service"], "Orders Service");
        assert_eq!(health["delivery_circuit"]["state"], "closed");
        assert_eq!(health["orchestration"]["attached"], 0);
    }
}
