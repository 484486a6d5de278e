//! Order creation with best-effort delivery, end to end through the gateway

use std::sync::Arc;
use std::time::Duration;

use order_mesh::cache::MemorySnapshotCache;
use order_mesh::clock::SystemClock;
use order_mesh::gateway::{self, AppState};
use order_mesh::proxy::{Dependency, DependencyProxy};
use order_mesh::resilience::{CircuitBreakerConfig, CircuitState};
use order_mesh::services::deliveries::model::Delivery;
use order_mesh::services::deliveries::{self, DeliveriesState, MemoryDeliveryStore};
use order_mesh::services::orders::model::Order;
use order_mesh::services::orders::{self, DeliveryOrchestrator, MemoryOrderStore, OrderStore, OrdersState};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const DOWN: &str = "http://127.0.0.1:1";

async fn spawn(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn proxy(dependency: Dependency, url: &str) -> Arc<DependencyProxy> {
    Arc::new(
        DependencyProxy::new(dependency, url, CircuitBreakerConfig::default(), SystemClock::shared())
            .unwrap(),
    )
}

fn memory_cache<T>() -> Arc<MemorySnapshotCache<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Arc::new(MemorySnapshotCache::new(
        64,
        Duration::from_secs(300),
        SystemClock::shared(),
    ))
}

struct Stack {
    gateway: String,
    orders: Arc<MemoryOrderStore>,
    orchestrator: Arc<DeliveryOrchestrator>,
}

/// Orders and Deliveries services plus the gateway in front of them.
/// `deliveries_up = false` points the orchestrator at a dead address.
async fn stack(deliveries_up: bool) -> Stack {
    let deliveries_url = spawn(deliveries::router(DeliveriesState {
        store: Arc::new(MemoryDeliveryStore::new()),
        cache: memory_cache::<Delivery>(),
    }))
    .await;
    let orchestrator_target = if deliveries_up { deliveries_url.as_str() } else { DOWN };

    let orchestrator = Arc::new(DeliveryOrchestrator::new(proxy(
        Dependency::Delivery,
        orchestrator_target,
    )));
    let order_store = Arc::new(MemoryOrderStore::new());
    let orders_url = spawn(orders::router(OrdersState {
        store: order_store.clone(),
        cache: memory_cache::<Order>(),
        orchestrator: orchestrator.clone(),
    }))
    .await;

    let gateway = spawn(gateway::router(Arc::new(AppState::new(
        proxy(Dependency::Users, DOWN),
        proxy(Dependency::Orders, &orders_url),
        proxy(Dependency::Delivery, &deliveries_url),
    ))))
    .await;

    Stack {
        gateway,
        orders: order_store,
        orchestrator,
    }
}

fn book_order() -> Value {
    json!({"user_id": 1, "product": "book", "delivery_address": "123 Main St"})
}

#[tokio::test]
async fn test_order_with_address_gets_tracking_number() {
    let stack = stack(true).await;
    let client = reqwest::Client::new();
    let base = &stack.gateway;

    let response = client
        .post(format!("{base}/orders"))
        .json(&book_order())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let order: Value = response.json().await.unwrap();

    let tracking = order["delivery_info"]["tracking_number"].as_str().unwrap();
    let digits = tracking.strip_prefix("TRK").unwrap();
    assert!(!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
    assert!(order["delivery_info"]["estimated_delivery_date"].is_string());

    // delivery_info is transient: a later read of the order has none
    let stored: Value = client
        .get(format!("{base}/orders/{}", order["id"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(stored.get("delivery_info").is_none());

    let tracked: Value = client
        .get(format!("{base}/deliveries/tracking/{tracking}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tracked["order_id"], order["id"]);
    assert_eq!(tracked["status"], "pending");
    assert_eq!(tracked["address"], "123 Main St");

    let by_order: Vec<Value> = client
        .get(format!("{base}/deliveries?order_id={}", order["id"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_order.len(), 1);
}

#[tokio::test]
async fn test_order_survives_deliveries_outage() {
    let stack = stack(false).await;
    let client = reqwest::Client::new();
    let base = &stack.gateway;

    for _ in 0..3 {
        let response = client
            .post(format!("{base}/orders"))
            .json(&book_order())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let order: Value = response.json().await.unwrap();
        assert!(order.get("delivery_info").is_none());
        assert_eq!(order["product"], "book");
    }

    assert_eq!(stack.orders.list(None).await.unwrap().len(), 3);
    assert_eq!(stack.orchestrator.circuit().state, CircuitState::Open);
    assert_eq!(stack.orchestrator.stats().failed, 3);
    assert_eq!(stack.orchestrator.stats().attached, 0);
}

#[tokio::test]
async fn test_delivered_date_is_not_cleared() {
    let stack = stack(true).await;
    let client = reqwest::Client::new();
    let base = &stack.gateway;

    let order: Value = client
        .post(format!("{base}/orders"))
        .json(&book_order())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tracking = order["delivery_info"]["tracking_number"].as_str().unwrap();
    let delivery: Value = client
        .get(format!("{base}/deliveries/tracking/{tracking}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let url = format!("{base}/deliveries/{}", delivery["id"]);

    let before = chrono::Utc::now();
    let delivered: Value = client
        .put(&url)
        .json(&json!({"status": "delivered"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let stamped: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(delivered["actual_delivery_date"].clone()).unwrap();
    assert!(stamped >= before);

    let rejected = client
        .put(&url)
        .json(&json!({"status": "in_transit"}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 400);

    let current: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(current["status"], "delivered");
    assert_eq!(current["actual_delivery_date"], delivered["actual_delivery_date"]);
}
