//! Best-effort delivery creation after an order commits.
//!
//! The delivery call runs on its own task through the Deliveries proxy, so it
//! completes even if the client goes away and its failure can never reach
//! the order-creation result. No retry, no compensation: an order may end up
//! without a delivery.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use super::model::DeliveryInfo;
use crate::proxy::{DependencyProxy, ProxyRequest, Reply};
use crate::resilience::CircuitSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("deliveries unavailable: {0}")]
    Unavailable(Value),

    #[error("deliveries refused the request ({status}): {body}")]
    Rejected { status: StatusCode, body: Value },

    #[error("unexpected delivery payload: {0}")]
    UnexpectedBody(String),

    #[error("delivery task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestrationStats {
    pub attached: u64,
    pub failed: u64,
}

#[derive(Debug)]
pub struct DeliveryOrchestrator {
    deliveries: Arc<DependencyProxy>,
    attached: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryOrchestrator {
    pub fn new(deliveries: Arc<DependencyProxy>) -> Self {
        Self {
            deliveries,
            attached: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Create a pending delivery for `order_id`. Failures are logged and
    /// counted, never returned.
    pub async fn attach_delivery(&self, order_id: i64, address: String) -> Option<DeliveryInfo> {
        let deliveries = Arc::clone(&self.deliveries);
        let task = tokio::spawn(async move { create_delivery(&deliveries, order_id, address).await });

        let outcome = match task.await {
            Ok(result) => result,
            Err(e) => Err(OrchestrationError::Task(e.to_string())),
        };

        match outcome {
            Ok(info) => {
                self.attached.fetch_add(1, Ordering::Relaxed);
                info!(order_id, tracking_number = %info.tracking_number, "Delivery created for order");
                Some(info)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(order_id, error = %e, "Failed to create delivery, order kept");
                None
            }
        }
    }

    pub fn stats(&self) -> OrchestrationStats {
        OrchestrationStats {
            attached: self.attached.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn circuit(&self) -> CircuitSnapshot {
        self.deliveries.snapshot()
    }
}

async fn create_delivery(
    deliveries: &DependencyProxy,
    order_id: i64,
    address: String,
) -> Result<DeliveryInfo, OrchestrationError> {
    let request = ProxyRequest::post(
        ["deliveries"],
        json!({ "order_id": order_id, "address": address, "status": "pending" }),
    );

    match deliveries.fire(request).await {
        Reply::Success { body, .. } => {
            serde_json::from_value(body).map_err(|e| OrchestrationError::UnexpectedBody(e.to_string()))
        }
        Reply::NotFound(body) => Err(OrchestrationError::Rejected {
            status: StatusCode::NOT_FOUND,
            body,
        }),
        Reply::Rejected { status, body } => Err(OrchestrationError::Rejected { status, body }),
        Reply::Fallback(body) => Err(OrchestrationError::Unavailable(body)),
    }
}
