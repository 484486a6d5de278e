//! # API Gateway
//!
//! Public entry point. Every route maps onto one dependency proxy, except
//! `/users/{id}/details` which fans out to Users and Orders.

pub mod handlers;
pub mod openapi;
pub mod state;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::proxy::DependencyProxy;
use crate::resilience::CircuitEventKind;
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status))
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/users/{id}/details", get(handlers::user_details))
        .route("/orders", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/orders/{id}",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route(
            "/deliveries",
            get(handlers::list_deliveries).post(handlers::create_delivery),
        )
        .route(
            "/deliveries/tracking/{tracking_number}",
            get(handlers::track_delivery),
        )
        .route(
            "/deliveries/{id}",
            get(handlers::get_delivery)
                .put(handlers::update_delivery)
                .delete(handlers::delete_delivery),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Log every circuit transition together with the counters that caused it
pub fn spawn_circuit_monitor(state: &AppState) -> Vec<JoinHandle<()>> {
    state
        .proxies()
        .into_iter()
        .map(|proxy| {
            let proxy: Arc<DependencyProxy> = Arc::clone(proxy);
            let mut events = proxy.breaker().subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            let snapshot = proxy.snapshot();
                            let rate = snapshot.failure_rate_percent;
                            match event.kind {
                                CircuitEventKind::Opened => warn!(
                                    circuit = %event.circuit,
                                    failure_rate_percent = rate,
                                    failures = snapshot.window.failed(),
                                    retry_in_ms = snapshot.retry_in_ms,
                                    "Dependency unavailable, serving fallbacks"
                                ),
                                CircuitEventKind::HalfOpen => info!(
                                    circuit = %event.circuit,
                                    "Probing dependency with a trial call"
                                ),
                                CircuitEventKind::Closed => info!(
                                    circuit = %event.circuit,
                                    "Dependency recovered"
                                ),
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!(circuit = proxy.dependency().name(), missed, "Circuit monitor lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        })
        .collect()
}

/// Start the HTTP gateway
pub async fn run_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let _monitors = spawn_circuit_monitor(&state);
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Gateway listening");
    info!("API docs: http://{}/docs", addr);
    axum::serve(listener, app).await
}
