//! Order Mesh API Gateway
//!
//! ```text
//! client ──▶ Gateway ──▶ DependencyProxy ──▶ CircuitBreaker ──▶ users / orders / delivery
//! ```
//!
//! Usage: `order_mesh [--env dev|docker] [--port 8000]`

use anyhow::Context;
use order_mesh::clock::SystemClock;
use order_mesh::config::{CliArgs, Component};
use order_mesh::gateway::{self, AppState};
use order_mesh::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = args
        .load_config(Component::Gateway)
        .context("loading gateway config")?;
    let _log_guard = init_logging(&config, Component::Gateway.name());

    tracing::info!(env = %args.env, "Starting API Gateway");
    tracing::info!(
        users = %config.upstreams.users_url,
        orders = %config.upstreams.orders_url,
        delivery = %config.upstreams.delivery_url,
        "Upstreams"
    );

    let state = AppState::from_config(&config, SystemClock::shared())
        .context("building dependency proxies")?;

    let addr = config.gateway.addr();
    gateway::run_server(&addr, state)
        .await
        .with_context(|| format!("serving gateway on {addr}"))
}
