//! Delivery system-of-record

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::fmt;

use super::model::{Delivery, DeliveryStatus, NewDelivery};
use crate::db::{Database, is_unique_violation};
use crate::services::ServiceError;
use crate::services::memory::MemoryTable;

pub const TRACKING_TAKEN: &str = "Tracking number already exists";

pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS deliveries (
    id BIGSERIAL PRIMARY KEY,
    order_id BIGINT NOT NULL,
    address TEXT NOT NULL,
    status VARCHAR(32) NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_transit', 'delivered', 'cancelled', 'failed')),
    tracking_number VARCHAR(64) NOT NULL UNIQUE,
    estimated_delivery_date TIMESTAMPTZ,
    actual_delivery_date TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
    "CREATE INDEX IF NOT EXISTS idx_deliveries_order_id ON deliveries (order_id)",
];

const COLUMNS: &str = "id, order_id, address, status, tracking_number, \
    estimated_delivery_date, actual_delivery_date, created_at, updated_at";

#[async_trait]
pub trait DeliveryStore: Send + Sync + fmt::Debug {
    /// Whether the system-of-record is reachable
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn list(&self, order_id: Option<i64>) -> Result<Vec<Delivery>, ServiceError>;

    async fn get(&self, id: i64) -> Result<Option<Delivery>, ServiceError>;

    async fn find_by_tracking(&self, tracking_number: &str) -> Result<Option<Delivery>, ServiceError>;

    /// Fails with `Duplicate` on a tracking number collision
    async fn create(&self, delivery: NewDelivery) -> Result<Delivery, ServiceError>;

    /// Persist an updated row. A stored `actual_delivery_date` always wins.
    ///
    /// The terminal-status rule is re-checked against the row as stored at
    /// write time, so a concurrent move into `delivered` cannot be undone.
    async fn save(&self, delivery: &Delivery) -> Result<Option<Delivery>, ServiceError>;

    async fn delete(&self, id: i64) -> Result<Option<Delivery>, ServiceError>;
}

fn from_row(row: PgRow) -> Result<Delivery, ServiceError> {
    let status: String = row.try_get("status")?;
    Ok(Delivery {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        address: row.try_get("address")?,
        status: status.parse()?,
        tracking_number: row.try_get("tracking_number")?,
        estimated_delivery_date: row.try_get("estimated_delivery_date")?,
        actual_delivery_date: row.try_get("actual_delivery_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PgDeliveryStore {
    db: Database,
}

impl PgDeliveryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryStore for PgDeliveryStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.db.health_check().await?)
    }

    async fn list(&self, order_id: Option<i64>) -> Result<Vec<Delivery>, ServiceError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM deliveries WHERE ($1::BIGINT IS NULL OR order_id = $1) ORDER BY id"
        );
        let rows = sqlx::query(&sql).bind(order_id).fetch_all(self.db.pool()).await?;
        rows.into_iter().map(from_row).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Delivery>, ServiceError> {
        let sql = format!("SELECT {COLUMNS} FROM deliveries WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.db.pool()).await?;
        row.map(from_row).transpose()
    }

    async fn find_by_tracking(&self, tracking_number: &str) -> Result<Option<Delivery>, ServiceError> {
        let sql = format!("SELECT {COLUMNS} FROM deliveries WHERE tracking_number = $1");
        let row = sqlx::query(&sql)
            .bind(tracking_number)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(from_row).transpose()
    }

    async fn create(&self, delivery: NewDelivery) -> Result<Delivery, ServiceError> {
        let sql = format!(
            r#"INSERT INTO deliveries (order_id, address, status, tracking_number, estimated_delivery_date)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(delivery.order_id)
            .bind(&delivery.address)
            .bind(delivery.status.as_str())
            .bind(&delivery.tracking_number)
            .bind(delivery.estimated_delivery_date)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Duplicate(TRACKING_TAKEN)
                } else {
                    ServiceError::Database(e)
                }
            })?;
        from_row(row)
    }

    async fn save(&self, delivery: &Delivery) -> Result<Option<Delivery>, ServiceError> {
        let sql = format!(
            r#"UPDATE deliveries
               SET address = $2,
                   status = $3,
                   estimated_delivery_date = $4,
                   actual_delivery_date = COALESCE(actual_delivery_date, $5),
                   updated_at = $6
               WHERE id = $1 AND (status <> 'delivered' OR $3 = 'delivered')
               RETURNING {COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(delivery.id)
            .bind(&delivery.address)
            .bind(delivery.status.as_str())
            .bind(delivery.estimated_delivery_date)
            .bind(delivery.actual_delivery_date)
            .bind(delivery.updated_at)
            .fetch_optional(self.db.pool())
            .await?;
        if let Some(row) = row {
            return from_row(row).map(Some);
        }
        // No row updated: either it is gone or the status guard refused
        match self.get(delivery.id).await? {
            Some(stored) => {
                stored.status.ensure_transition(delivery.status)?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: i64) -> Result<Option<Delivery>, ServiceError> {
        let sql = format!("DELETE FROM deliveries WHERE id = $1 RETURNING {COLUMNS}");
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.db.pool()).await?;
        row.map(from_row).transpose()
    }
}

#[derive(Debug, Default)]
pub struct MemoryDeliveryStore {
    table: MemoryTable<Delivery>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn list(&self, order_id: Option<i64>) -> Result<Vec<Delivery>, ServiceError> {
        Ok(self
            .table
            .lock()
            .rows
            .values()
            .filter(|d| order_id.is_none_or(|oid| d.order_id == oid))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Delivery>, ServiceError> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn find_by_tracking(&self, tracking_number: &str) -> Result<Option<Delivery>, ServiceError> {
        Ok(self
            .table
            .lock()
            .rows
            .values()
            .find(|d| d.tracking_number == tracking_number)
            .cloned())
    }

    async fn create(&self, delivery: NewDelivery) -> Result<Delivery, ServiceError> {
        let mut table = self.table.lock();
        if table
            .rows
            .values()
            .any(|d| d.tracking_number == delivery.tracking_number)
        {
            return Err(ServiceError::Duplicate(TRACKING_TAKEN));
        }
        let now = Utc::now();
        let id = table.allocate_id();
        let delivery = Delivery {
            id,
            order_id: delivery.order_id,
            address: delivery.address,
            status: delivery.status,
            tracking_number: delivery.tracking_number,
            estimated_delivery_date: Some(delivery.estimated_delivery_date),
            actual_delivery_date: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, delivery.clone());
        Ok(delivery)
    }

    async fn save(&self, delivery: &Delivery) -> Result<Option<Delivery>, ServiceError> {
        let mut table = self.table.lock();
        let Some(stored) = table.rows.get_mut(&delivery.id) else {
            return Ok(None);
        };
        stored.status.ensure_transition(delivery.status)?;
        let actual_delivery_date = stored.actual_delivery_date.or(delivery.actual_delivery_date);
        *stored = Delivery {
            actual_delivery_date,
            ..delivery.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<Delivery>, ServiceError> {
        Ok(self.table.lock().rows.remove(&id))
    }
}
