use reqwest::StatusCode;
use thiserror::Error;

/// Raw outcome of a downstream call that counts against the circuit
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("upstream returned {0}")]
    Upstream(StatusCode),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err)
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Request(err)
        }
    }
}

/// Misuse of a proxy; never caused by the downstream service
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid base url {url}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
