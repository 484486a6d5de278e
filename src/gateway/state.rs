use std::sync::Arc;

use crate::clock::SharedClock;
use crate::config::AppConfig;
use crate::proxy::{Dependency, DependencyProxy, ProxyError};
use crate::resilience::CircuitSnapshot;

/// Gateway shared state: one proxy, and therefore one circuit, per dependency
#[derive(Debug, Clone)]
pub struct AppState {
    pub users: Arc<DependencyProxy>,
    pub orders: Arc<DependencyProxy>,
    pub deliveries: Arc<DependencyProxy>,
}

impl AppState {
    pub fn new(
        users: Arc<DependencyProxy>,
        orders: Arc<DependencyProxy>,
        deliveries: Arc<DependencyProxy>,
    ) -> Self {
        Self {
            users,
            orders,
            deliveries,
        }
    }

    /// Build the three proxies from the upstream URLs and breaker settings
    pub fn from_config(config: &AppConfig, clock: SharedClock) -> Result<Self, ProxyError> {
        let breaker = config.circuit_breaker.to_breaker_config();
        let proxy = |dependency: Dependency, url: &str| {
            DependencyProxy::new(dependency, url, breaker.clone(), clock.clone()).map(Arc::new)
        };

        Ok(Self::new(
            proxy(Dependency::Users, &config.upstreams.users_url)?,
            proxy(Dependency::Orders, &config.upstreams.orders_url)?,
            proxy(Dependency::Delivery, &config.upstreams.delivery_url)?,
        ))
    }

    pub fn proxies(&self) -> [&Arc<DependencyProxy>; 3] {
        [&self.users, &self.orders, &self.deliveries]
    }

    pub fn snapshots(&self) -> [CircuitSnapshot; 3] {
        self.proxies().map(|proxy| proxy.snapshot())
    }
}
