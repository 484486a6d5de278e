use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::resilience::CircuitBreakerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidOverride { key: &'static str, value: String },

    #[error("{component}: database_url is not configured")]
    MissingDatabaseUrl { component: &'static str },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: ServerConfig,
    pub users_service: ServerConfig,
    pub orders_service: ServerConfig,
    pub delivery_service: ServerConfig,
    pub upstreams: UpstreamsConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "order_mesh.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            gateway: ServerConfig::on_port(8000),
            users_service: ServerConfig::on_port(3001),
            orders_service: ServerConfig::on_port(3002),
            delivery_service: ServerConfig::on_port(3003),
            upstreams: UpstreamsConfig::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Listener (and store) of one process
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl ServerConfig {
    fn on_port(port: u16) -> Self {
        Self {
            host: default_host(),
            port,
            database_url: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Base URLs of the downstream services
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamsConfig {
    pub users_url: String,
    pub orders_url: String,
    pub delivery_url: String,
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            users_url: "http://service_users:3001".to_string(),
            orders_url: "http://service_orders:3002".to_string(),
            delivery_url: "http://service_delivery:3003".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub timeout_ms: u64,
    pub error_threshold_percentage: u8,
    pub reset_timeout_ms: u64,
    pub rolling_window_ms: u64,
    pub rolling_buckets: u32,
    pub volume_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            error_threshold_percentage: 50,
            reset_timeout_ms: 3000,
            rolling_window_ms: 10_000,
            rolling_buckets: 10,
            volume_threshold: 0,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            error_threshold_percentage: self.error_threshold_percentage,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            rolling_window: Duration::from_millis(self.rolling_window_ms),
            rolling_buckets: self.rolling_buckets,
            volume_threshold: self.volume_threshold,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub url: String,
    pub ttl_secs: u64,
    /// Capacity of the in-process backend
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            url: "redis://localhost:6379".to_string(),
            ttl_secs: 300,
            max_entries: 10_000,
        }
    }
}

/// Process that is loading the config; selects which section `PORT` and
/// `DATABASE_URL` apply to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Gateway,
    Users,
    Orders,
    Delivery,
}

impl Component {
    pub fn name(&self) -> &'static str {
        match self {
            Component::Gateway => "gateway",
            Component::Users => "users",
            Component::Orders => "orders",
            Component::Delivery => "delivery",
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Load `config/<env>.yaml` and apply process environment overrides
    pub fn load_for(env: &str, component: Component) -> Result<Self, ConfigError> {
        let mut config = Self::load(env)?;
        config.apply_env_overrides(component, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn server(&self, component: Component) -> &ServerConfig {
        match component {
            Component::Gateway => &self.gateway,
            Component::Users => &self.users_service,
            Component::Orders => &self.orders_service,
            Component::Delivery => &self.delivery_service,
        }
    }

    fn server_mut(&mut self, component: Component) -> &mut ServerConfig {
        match component {
            Component::Gateway => &mut self.gateway,
            Component::Users => &mut self.users_service,
            Component::Orders => &mut self.orders_service,
            Component::Delivery => &mut self.delivery_service,
        }
    }

    pub fn database_url(&self, component: Component) -> Result<&str, ConfigError> {
        self.server(component)
            .database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl {
                component: component.name(),
            })
    }

    /// Apply environment overrides through `lookup` (the process env in
    /// production, a map in tests)
    pub fn apply_env_overrides<F>(&mut self, component: Component, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("USERS_SERVICE_URL") {
            self.upstreams.users_url = url;
        }
        if let Some(url) = lookup("ORDERS_SERVICE_URL") {
            self.upstreams.orders_url = url;
        }
        if let Some(url) = lookup("DELIVERY_SERVICE_URL") {
            self.upstreams.delivery_url = url;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.url = url;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.server_mut(component).database_url = Some(url);
        }
        if let Some(port) = parse_override(&lookup, "PORT")? {
            self.server_mut(component).port = port;
        }
        if let Some(ms) = parse_override(&lookup, "CIRCUIT_TIMEOUT_MS")? {
            self.circuit_breaker.timeout_ms = ms;
        }
        if let Some(pct) = parse_override(&lookup, "CIRCUIT_ERROR_THRESHOLD_PERCENTAGE")? {
            self.circuit_breaker.error_threshold_percentage = pct;
        }
        if let Some(ms) = parse_override(&lookup, "CIRCUIT_RESET_TIMEOUT_MS")? {
            self.circuit_breaker.reset_timeout_ms = ms;
        }
        if let Some(secs) = parse_override(&lookup, "CACHE_TTL_SECS")? {
            self.cache.ttl_secs = secs;
        }
        Ok(())
    }
}

/// Command line shared by every binary: `--env/-e <name>` and `--port <n>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub env: String,
    pub port: Option<u16>,
}

impl CliArgs {
    pub fn parse() -> Self {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let value_of = |names: &[&str]| {
            args.windows(2)
                .find(|pair| names.contains(&pair[0].as_str()))
                .map(|pair| pair[1].clone())
        };

        Self {
            env: value_of(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string()),
            port: value_of(&["--port"]).and_then(|p| p.parse().ok()),
        }
    }

    /// Load the config for `component`; `--port` beats `PORT` and the file
    pub fn load_config(&self, component: Component) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::load_for(&self.env, component)?;
        if let Some(port) = self.port {
            config.server_mut(component).port = port;
        }
        Ok(config)
    }
}

fn parse_override<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidOverride { key, value }),
    }
}
