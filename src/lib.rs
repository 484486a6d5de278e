//! Order Mesh - users, orders and deliveries behind a resilient gateway
//!
//! # Modules
//!
//! - [`resilience`] - Per-dependency circuit breaker
//! - [`proxy`] - Dependency proxies that classify downstream outcomes
//! - [`gateway`] - Public routes, aggregation and health
//! - [`cache`] - Cache-aside snapshot store (Redis or in-process)
//! - [`services`] - Users, Orders (with delivery orchestration) and Deliveries
//! - [`config`] / [`logging`] / [`db`] - Ambient runtime plumbing
//! - [`clock`] - Injectable time source

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod proxy;
pub mod resilience;
pub mod services;

// Convenient re-exports at crate root
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{AppConfig, Component};
pub use proxy::{Dependency, DependencyProxy, ProxyRequest, Reply};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
