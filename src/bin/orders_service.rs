//! Orders service, including delivery creation for new orders
//!
//! Usage: `orders_service [--env dev|docker] [--port 3002]`

use anyhow::Context;
use std::sync::Arc;

use order_mesh::clock::SystemClock;
use order_mesh::config::{CliArgs, Component};
use order_mesh::logging::init_logging;
use order_mesh::proxy::{Dependency, DependencyProxy};
use order_mesh::services::orders::{self, DeliveryOrchestrator, OrdersState, PgOrderStore, store::SCHEMA};
use order_mesh::services::{connect_backends, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = args
        .load_config(Component::Orders)
        .context("loading orders config")?;
    let _log_guard = init_logging(&config, Component::Orders.name());

    tracing::info!(env = %args.env, "Starting Orders service");
    let (db, cache) = connect_backends(&config, Component::Orders, SCHEMA)
        .await
        .context("orders service startup")?;

    let deliveries = DependencyProxy::new(
        Dependency::Delivery,
        &config.upstreams.delivery_url,
        config.circuit_breaker.to_breaker_config(),
        SystemClock::shared(),
    )
    .context("building deliveries proxy")?;
    tracing::info!(url = %config.upstreams.delivery_url, "Deliveries upstream");

    let state = OrdersState {
        store: Arc::new(PgOrderStore::new(db)),
        cache,
        orchestrator: Arc::new(DeliveryOrchestrator::new(Arc::new(deliveries))),
    };

    let addr = config.orders_service.addr();
    serve(orders::router(state), &addr, Component::Orders.name())
        .await
        .with_context(|| format!("serving orders on {addr}"))
}
