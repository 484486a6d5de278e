use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const ORDER_NOT_FOUND: &str = "Order not found";
pub const DEFAULT_STATUS: &str = "pending";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub product: String,
    /// DECIMAL(10,2)
    pub amount: Decimal,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Fix the scale at two places, as the amount column stores it
pub fn to_cents(mut amount: Decimal) -> Decimal {
    amount.rescale(2);
    amount
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrder {
    #[validate(
        required(message = "user_id and product are required"),
        range(min = 1, message = "user_id and product are required")
    )]
    pub user_id: Option<i64>,
    #[validate(
        required(message = "user_id and product are required"),
        length(min = 1, message = "user_id and product are required")
    )]
    pub product: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
    /// Triggers delivery creation; never stored on the order
    pub delivery_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub product: String,
    pub amount: Decimal,
    pub status: String,
}

impl CreateOrder {
    /// Split into the insert and the optional delivery address
    pub fn into_parts(self) -> (NewOrder, Option<String>) {
        let order = NewOrder {
            user_id: self.user_id.unwrap_or_default(),
            product: self.product.unwrap_or_default(),
            amount: to_cents(self.amount.unwrap_or(Decimal::ZERO)),
            status: self
                .status
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        };
        let address = self.delivery_address.filter(|a| !a.trim().is_empty());
        (order, address)
    }
}

/// Partial update; `user_id` and `amount` apply whenever present, strings
/// only when non-empty
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateOrder {
    pub user_id: Option<i64>,
    pub product: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub user_id: Option<i64>,
    pub product: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
}

impl UpdateOrder {
    pub fn normalized(self) -> OrderChanges {
        OrderChanges {
            user_id: self.user_id,
            product: self.product.filter(|s| !s.is_empty()),
            amount: self.amount.map(to_cents),
            status: self.status.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub user_id: Option<i64>,
}

/// Delivery attached to a freshly created order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub tracking_number: String,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
}

/// Creation response: the stored order plus the transient delivery annotation
#[derive(Debug, Serialize)]
pub struct OrderCreated {
    #[serde(flatten)]
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<DeliveryInfo>,
}

#[derive(Debug, Serialize)]
pub struct OrderDeleted {
    pub message: &'static str,
    #[serde(rename = "deletedOrder")]
    pub deleted_order: Order,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_defaults() {
        let body: CreateOrder =
            serde_json::from_value(json!({"user_id": 1, "product": "book", "delivery_address": "  "}))
                .unwrap();
        let (order, address) = body.into_parts();
        assert_eq!(order.amount.to_string(), "0.00");
        assert_eq!(order.status, "pending");
        assert!(address.is_none());
    }

    #[test]
    fn test_amount_accepts_number_or_string() {
        let body: CreateOrder =
            serde_json::from_value(json!({"user_id": 1, "product": "book", "amount": "19.999"}))
                .unwrap();
        assert_eq!(body.into_parts().0.amount.to_string(), "20.00");

        let body: CreateOrder =
            serde_json::from_value(json!({"user_id": 1, "product": "book", "amount": 5.5})).unwrap();
        assert_eq!(body.into_parts().0.amount.to_string(), "5.50");
    }

    #[test]
    fn test_missing_product_fails_validation() {
        let body: CreateOrder = serde_json::from_value(json!({"user_id": 1})).unwrap();
        let errors = body.validate().unwrap_err();
        assert_eq!(
            crate::services::first_message(&errors),
            "user_id and product are required"
        );
    }
}
