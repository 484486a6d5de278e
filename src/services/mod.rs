//! # Backing services
//!
//! Users, Orders and Deliveries each own their system-of-record table and a
//! cache-aside store for lookups by id. They are consumed by the gateway and,
//! for Orders -> Deliveries, by the orchestrator.

pub mod deliveries;
mod error;
mod extract;
pub mod memory;
pub mod orders;
pub mod users;

pub use error::ServiceError;
pub use extract::{ValidatedJson, first_message};

use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::{self, CacheError, SharedCache};
use crate::clock::SystemClock;
use crate::config::{AppConfig, Component, ConfigError};
use crate::db::Database;

/// Liveness body shared by the services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}

impl ServiceHealth {
    pub fn ok(service: &'static str) -> Json<Self> {
        Json(Self {
            status: "OK",
            service,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
}

/// Startup failures; each one aborts the service process
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache: {0}")]
    Cache(#[from] CacheError),
}

/// Connect the system-of-record (creating its tables) and the cache
pub async fn connect_backends<T>(
    config: &AppConfig,
    component: Component,
    schema: &[&str],
) -> Result<(Database, SharedCache<T>), StartupError>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let db = Database::connect(config.database_url(component)?).await?;
    db.ensure_schema(schema).await?;
    info!(component = component.name(), "System-of-record ready");

    let cache = cache::connect(&config.cache, SystemClock::shared()).await?;
    Ok((db, cache))
}

/// Bind `addr` and serve `app` until the process ends
pub async fn serve(app: Router, addr: &str, component: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(component, %addr, "Listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve `app` on an ephemeral local port; returns its base URL
    pub async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}
