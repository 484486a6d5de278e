//! # Dependency proxies
//!
//! One [`DependencyProxy`] per downstream service. Each owns its circuit
//! breaker and classifies raw HTTP outcomes:
//!
//! | Downstream outcome        | Circuit  | [`Reply`]            |
//! |---------------------------|----------|----------------------|
//! | 2xx                       | success  | `Success`            |
//! | 404                       | success  | `NotFound`           |
//! | other 4xx                 | success  | `Rejected`           |
//! | 5xx, timeout, connect err | failure  | `Fallback`           |
//! | any, while open           | rejected | `Fallback`           |

mod error;
mod request;

pub use error::{ProxyError, TransportError};
pub use request::ProxyRequest;

use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

use crate::clock::SharedClock;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};

/// Downstream services reachable through a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Users,
    Orders,
    Delivery,
}

impl Dependency {
    /// Circuit name, also the key in the health report
    pub fn name(&self) -> &'static str {
        match self {
            Dependency::Users => "users",
            Dependency::Orders => "orders",
            Dependency::Delivery => "delivery",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Dependency::Users => "Users",
            Dependency::Orders => "Orders",
            Dependency::Delivery => "Delivery",
        }
    }

    /// Payload served while the circuit refuses calls
    pub fn fallback_payload(&self) -> Value {
        json!({ "error": format!("{} service temporarily unavailable", self.label()) })
    }
}

/// Classified result of [`DependencyProxy::fire`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success { status: StatusCode, body: Value },
    /// Domain "not found"; body propagated as-is
    NotFound(Value),
    /// Downstream refused the request (validation, duplicate key)
    Rejected { status: StatusCode, body: Value },
    Fallback(Value),
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback(_))
    }
}

#[derive(Debug)]
pub struct DependencyProxy {
    dependency: Dependency,
    base_url: Url,
    client: Client,
    breaker: Arc<CircuitBreaker>,
}

impl DependencyProxy {
    pub fn new(
        dependency: Dependency,
        base_url: &str,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(ProxyError::Client)?;
        let breaker = Arc::new(CircuitBreaker::new(dependency.name(), config, clock));
        Self::with_client(dependency, base_url, client, breaker)
    }

    pub fn with_client(
        dependency: Dependency,
        base_url: &str,
        client: Client,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ProxyError> {
        let invalid = |reason: String| ProxyError::BaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let base_url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("cannot carry a path".to_string()));
        }

        Ok(Self {
            dependency,
            base_url,
            client,
            breaker,
        })
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        self.breaker.snapshot()
    }

    /// Issue `request` through the circuit. Never fails: transport problems
    /// and an open circuit both come back as [`Reply::Fallback`].
    pub async fn fire(&self, request: ProxyRequest) -> Reply {
        let url = self.url_for(&request);
        let ProxyRequest { method, body, .. } = request;

        self.breaker
            .call_or_fallback(
                || self.send(method, url, body),
                || Reply::Fallback(self.dependency.fallback_payload()),
            )
            .await
    }

    fn url_for(&self, request: &ProxyRequest) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(request.segments.iter());
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Reply, TransportError> {
        debug!(circuit = self.dependency.name(), %method, %url, "Forwarding request");
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !(status.is_success() || status.is_client_error()) {
            return Err(TransportError::Upstream(status));
        }

        let bytes = response.bytes().await?;
        if status.is_success() {
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))?
            };
            return Ok(Reply::Success { status, body });
        }

        // Error bodies are passed through; non-JSON ones are wrapped
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            let text = String::from_utf8_lossy(&bytes);
            let message = match text.trim() {
                "" => status.canonical_reason().unwrap_or("Request failed"),
                trimmed => trimmed,
            };
            json!({ "error": message })
        });

        if status == StatusCode::NOT_FOUND {
            Ok(Reply::NotFound(body))
        } else {
            Ok(Reply::Rejected { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::resilience::CircuitState;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn proxy_for(server: &MockServer, config: CircuitBreakerConfig) -> DependencyProxy {
        DependencyProxy::new(Dependency::Users, &server.uri(), config, SystemClock::shared())
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_parsed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, CircuitBreakerConfig::default());
        let reply = proxy.fire(ProxyRequest::get(["users", "1"])).await;

        assert_eq!(
            reply,
            Reply::Success {
                status: StatusCode::OK,
                body: json!({"id": 1})
            }
        );
    }

    #[tokio::test]
    async fn test_post_forwards_body_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(query_param("source", "gateway"))
            .and(body_json(json!({"product": "book"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, CircuitBreakerConfig::default());
        let request =
            ProxyRequest::post(["orders"], json!({"product": "book"})).query("source", "gateway");

        match proxy.fire(request).await {
            Reply::Success { status, body } => {
                assert_eq!(status, StatusCode::CREATED);
                assert_eq!(body["id"], 9);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sustained_404_keeps_circuit_closed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "User not found"})),
            )
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, CircuitBreakerConfig::default());
        for id in 0..20 {
            let reply = proxy.fire(ProxyRequest::get(["users", &id.to_string()])).await;
            assert_eq!(reply, Reply::NotFound(json!({"error": "User not found"})));
        }

        let snapshot = proxy.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.window.failed(), 0);
        assert_eq!(snapshot.window.successes, 20);
    }

    #[tokio::test]
    async fn test_client_error_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "Email already exists"})),
            )
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, CircuitBreakerConfig::default());
        let reply = proxy.fire(ProxyRequest::post(["users"], json!({}))).await;

        assert_eq!(
            reply,
            Reply::Rejected {
                status: StatusCode::BAD_REQUEST,
                body: json!({"error": "Email already exists"})
            }
        );
        assert_eq!(proxy.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_server_error_trips_circuit_and_stops_network_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, CircuitBreakerConfig::default());
        let fallback = Dependency::Users.fallback_payload();

        assert_eq!(proxy.fire(ProxyRequest::get(["users", "1"])).await, Reply::Fallback(fallback.clone()));
        assert_eq!(proxy.breaker().state(), CircuitState::Open);

        // Short-circuited: the mock expects exactly one hit
        for _ in 0..3 {
            assert_eq!(proxy.fire(ProxyRequest::get(["users", "1"])).await, Reply::Fallback(fallback.clone()));
        }
        assert_eq!(proxy.snapshot().totals.rejects, 3);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = CircuitBreakerConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let proxy = proxy_for(&server, config);

        assert!(proxy.fire(ProxyRequest::get(["users"])).await.is_fallback());
        assert_eq!(proxy.snapshot().totals.timeouts, 1);
    }

    #[tokio::test]
    async fn test_unreachable_service_serves_fallback() {
        let proxy = DependencyProxy::new(
            Dependency::Delivery,
            "http://127.0.0.1:1",
            CircuitBreakerConfig::default(),
            SystemClock::shared(),
        )
        .unwrap();

        let reply = proxy.fire(ProxyRequest::get(["deliveries"])).await;
        assert_eq!(
            reply,
            Reply::Fallback(json!({"error": "Delivery service temporarily unavailable"}))
        );
    }

    #[test]
    fn test_segments_are_encoded() {
        let proxy = DependencyProxy::new(
            Dependency::Delivery,
            "http://deliveries:3003/",
            CircuitBreakerConfig::default(),
            SystemClock::shared(),
        )
        .unwrap();

        let request = ProxyRequest::get(["deliveries", "tracking", "TRK 1/2"]).query("order_id", "a&b");
        assert_eq!(
            proxy.url_for(&request).as_str(),
            "http://deliveries:3003/deliveries/tracking/TRK%201%2F2?order_id=a%26b"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let result = DependencyProxy::new(
            Dependency::Orders,
            "mailto:orders@example.com",
            CircuitBreakerConfig::default(),
            SystemClock::shared(),
        );
        assert!(matches!(result, Err(ProxyError::BaseUrl { .. })));
    }
}
