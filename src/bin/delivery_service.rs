//! Deliveries service
//!
//! Usage: `delivery_service [--env dev|docker] [--port 3003]`

use anyhow::Context;
use std::sync::Arc;

use order_mesh::config::{CliArgs, Component};
use order_mesh::logging::init_logging;
use order_mesh::services::deliveries::{self, DeliveriesState, PgDeliveryStore, store::SCHEMA};
use order_mesh::services::{connect_backends, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = args
        .load_config(Component::Delivery)
        .context("loading delivery config")?;
    let _log_guard = init_logging(&config, Component::Delivery.name());

    tracing::info!(env = %args.env, "Starting Delivery service");
    let (db, cache) = connect_backends(&config, Component::Delivery, SCHEMA)
        .await
        .context("delivery service startup")?;

    let state = DeliveriesState {
        store: Arc::new(PgDeliveryStore::new(db)),
        cache,
    };

    let addr = config.delivery_service.addr();
    serve(deliveries::router(state), &addr, Component::Delivery.name())
        .await
        .with_context(|| format!("serving deliveries on {addr}"))
}
