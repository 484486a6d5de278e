//! Users service
//!
//! Usage: `users_service [--env dev|docker] [--port 3001]`

use anyhow::Context;
use std::sync::Arc;

use order_mesh::config::{CliArgs, Component};
use order_mesh::logging::init_logging;
use order_mesh::services::users::{self, PgUserStore, UsersState, store::SCHEMA};
use order_mesh::services::{connect_backends, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = args
        .load_config(Component::Users)
        .context("loading users config")?;
    let _log_guard = init_logging(&config, Component::Users.name());

    tracing::info!(env = %args.env, "Starting Users service");
    let (db, cache) = connect_backends(&config, Component::Users, SCHEMA)
        .await
        .context("users service startup")?;

    let state = UsersState {
        store: Arc::new(PgUserStore::new(db)),
        cache,
    };

    let addr = config.users_service.addr();
    serve(users::router(state), &addr, Component::Users.name())
        .await
        .with_context(|| format!("serving users on {addr}"))
}
