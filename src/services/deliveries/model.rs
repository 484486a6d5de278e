use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::services::ServiceError;

pub const DELIVERY_NOT_FOUND: &str = "Delivery not found";
pub const DEFAULT_ETA_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Failed => "failed",
        }
    }

    /// `delivered` is terminal: the only status it accepts is itself.
    pub fn ensure_transition(self, next: DeliveryStatus) -> Result<(), ServiceError> {
        if self == DeliveryStatus::Delivered && next != DeliveryStatus::Delivered {
            return Err(ServiceError::Validation(format!(
                "Delivery already delivered, cannot change status to {next}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "in_transit" => Ok(DeliveryStatus::InTransit),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(ServiceError::Validation(format!(
                "Invalid status '{other}', expected one of pending, in_transit, delivered, cancelled, failed"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    pub address: String,
    pub status: DeliveryStatus,
    pub tracking_number: String,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    /// Apply a partial update at time `now`.
    ///
    /// `actual_delivery_date` is stamped on the first move into `delivered`
    /// and never overwritten; a delivered shipment cannot change status.
    pub fn apply(&mut self, changes: DeliveryChanges, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if let Some(status) = changes.status {
            self.status.ensure_transition(status)?;
        }
        if changes.actual_delivery_date.is_some() && self.actual_delivery_date.is_some() {
            return Err(ServiceError::Validation(
                "actual_delivery_date is already set".to_string(),
            ));
        }

        if let Some(address) = changes.address {
            self.address = address;
        }
        if let Some(eta) = changes.estimated_delivery_date {
            self.estimated_delivery_date = Some(eta);
        }
        if let Some(actual) = changes.actual_delivery_date {
            self.actual_delivery_date = Some(actual);
        }
        if let Some(status) = changes.status {
            self.status = status;
            if status == DeliveryStatus::Delivered && self.actual_delivery_date.is_none() {
                self.actual_delivery_date = Some(now);
            }
        }
        self.updated_at = now;
        Ok(())
    }
}

/// `TRK<epoch millis><4 random digits>`
pub fn tracking_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("TRK{}{:04}", now.timestamp_millis(), suffix)
}

pub fn default_eta(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(DEFAULT_ETA_DAYS)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDelivery {
    #[validate(
        required(message = "order_id and address are required"),
        range(min = 1, message = "order_id and address are required")
    )]
    pub order_id: Option<i64>,
    #[validate(
        required(message = "order_id and address are required"),
        length(min = 1, message = "order_id and address are required")
    )]
    pub address: Option<String>,
    pub status: Option<String>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub order_id: i64,
    pub address: String,
    pub status: DeliveryStatus,
    pub tracking_number: String,
    pub estimated_delivery_date: DateTime<Utc>,
}

impl CreateDelivery {
    pub fn into_new(self, now: DateTime<Utc>) -> Result<NewDelivery, ServiceError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => s.parse()?,
            None => DeliveryStatus::Pending,
        };
        Ok(NewDelivery {
            order_id: self.order_id.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            status,
            tracking_number: tracking_number(now),
            estimated_delivery_date: self
                .estimated_delivery_date
                .unwrap_or_else(|| default_eta(now)),
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDelivery {
    pub address: Option<String>,
    pub status: Option<String>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryChanges {
    pub address: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
}

impl UpdateDelivery {
    pub fn normalized(self) -> Result<DeliveryChanges, ServiceError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse()?),
            None => None,
        };
        Ok(DeliveryChanges {
            address: self.address.filter(|s| !s.is_empty()),
            status,
            estimated_delivery_date: self.estimated_delivery_date,
            actual_delivery_date: self.actual_delivery_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DeliveryFilter {
    pub order_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryDeleted {
    pub message: &'static str,
    #[serde(rename = "deletedDelivery")]
    pub deleted_delivery: Delivery,
}
