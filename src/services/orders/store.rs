//! Order system-of-record

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;

use super::model::{NewOrder, Order, OrderChanges};
use crate::db::Database;
use crate::services::ServiceError;
use crate::services::memory::MemoryTable;

pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS orders (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    product VARCHAR(255) NOT NULL,
    amount NUMERIC(10, 2) NOT NULL DEFAULT 0.00,
    status VARCHAR(64) NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)"#,
    "CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id)",
];

const COLUMNS: &str = "id, user_id, product, amount, status, created_at, updated_at";

#[async_trait]
pub trait OrderStore: Send + Sync + fmt::Debug {
    /// Whether the system-of-record is reachable
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// All orders, or only those of `user_id`
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>, ServiceError>;

    async fn get(&self, id: i64) -> Result<Option<Order>, ServiceError>;

    async fn create(&self, order: NewOrder) -> Result<Order, ServiceError>;

    async fn update(&self, id: i64, changes: OrderChanges) -> Result<Option<Order>, ServiceError>;

    async fn delete(&self, id: i64) -> Result<Option<Order>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct PgOrderStore {
    db: Database,
}

impl PgOrderStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.db.health_check().await?)
    }

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>, ServiceError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM orders WHERE ($1::BIGINT IS NULL OR user_id = $1) ORDER BY id"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(orders)
    }

    async fn get(&self, id: i64) -> Result<Option<Order>, ServiceError> {
        let sql = format!("SELECT {COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(order)
    }

    async fn create(&self, order: NewOrder) -> Result<Order, ServiceError> {
        let sql = format!(
            "INSERT INTO orders (user_id, product, amount, status) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order.user_id)
            .bind(&order.product)
            .bind(order.amount)
            .bind(&order.status)
            .fetch_one(self.db.pool())
            .await?;
        Ok(order)
    }

    async fn update(&self, id: i64, changes: OrderChanges) -> Result<Option<Order>, ServiceError> {
        let sql = format!(
            r#"UPDATE orders
               SET user_id = COALESCE($2, user_id),
                   product = COALESCE($3, product),
                   amount = COALESCE($4, amount),
                   status = COALESCE($5, status),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {COLUMNS}"#
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(changes.user_id)
            .bind(changes.product)
            .bind(changes.amount)
            .bind(changes.status)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(order)
    }

    async fn delete(&self, id: i64) -> Result<Option<Order>, ServiceError> {
        let sql = format!("DELETE FROM orders WHERE id = $1 RETURNING {COLUMNS}");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(order)
    }
}

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    table: MemoryTable<Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .table
            .lock()
            .rows
            .values()
            .filter(|o| user_id.is_none_or(|uid| o.user_id == uid))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Order>, ServiceError> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn create(&self, order: NewOrder) -> Result<Order, ServiceError> {
        let mut table = self.table.lock();
        let now = Utc::now();
        let id = table.allocate_id();
        let order = Order {
            id,
            user_id: order.user_id,
            product: order.product,
            amount: order.amount,
            status: order.status,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, order.clone());
        Ok(order)
    }

    async fn update(&self, id: i64, changes: OrderChanges) -> Result<Option<Order>, ServiceError> {
        let mut table = self.table.lock();
        let Some(order) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(user_id) = changes.user_id {
            order.user_id = user_id;
        }
        if let Some(product) = changes.product {
            order.product = product;
        }
        if let Some(amount) = changes.amount {
            order.amount = amount;
        }
        if let Some(status) = changes.status {
            order.status = status;
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<Order>, ServiceError> {
        Ok(self.table.lock().rows.remove(&id))
    }
}
