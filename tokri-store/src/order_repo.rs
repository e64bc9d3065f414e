use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tokri_core::visibility::{Party, Visibility};
use tokri_order::models::{CourierShipment, Order, OrderStatus};
use tokri_order::repository::OrderRepository;

/// Serialize a unit-variant enum to its wire name ("cod", "pending", ...).
pub(crate) fn enum_to_str<T: serde::Serialize>(
    value: &T,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(format!("expected string-encoded enum, got {}", other).into()),
    }
}

pub(crate) fn enum_from_str<T: serde::de::DeserializeOwned>(
    s: &str,
) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    Ok(serde_json::from_value(serde_json::Value::String(
        s.to_string(),
    ))?)
}

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "id, order_number, customer_id, items, shipping, payment_method, \
     payment_status, status, courier, total, shipping_charge, discount, coupon_code, \
     hidden_from_user, hidden_from_admin, delivered_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: Option<String>,
    customer_id: String,
    items: serde_json::Value,
    shipping: serde_json::Value,
    payment_method: String,
    payment_status: String,
    status: String,
    courier: Option<serde_json::Value>,
    total: i64,
    shipping_charge: i64,
    discount: i64,
    coupon_code: Option<String>,
    hidden_from_user: bool,
    hidden_from_admin: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, Box<dyn std::error::Error + Send + Sync>> {
        let courier: Option<CourierShipment> = match self.courier {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_id: self.customer_id,
            items: serde_json::from_value(self.items)?,
            shipping: serde_json::from_value(self.shipping)?,
            payment_method: enum_from_str(&self.payment_method)?,
            payment_status: enum_from_str(&self.payment_status)?,
            status: enum_from_str(&self.status)?,
            courier,
            total: self.total,
            shipping_charge: self.shipping_charge,
            discount: self.discount,
            coupon_code: self.coupon_code,
            visibility: Visibility {
                hidden_from_user: self.hidden_from_user,
                hidden_from_admin: self.hidden_from_admin,
            },
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn statuses_as_text(
    statuses: &[OrderStatus],
) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let courier = match &order.courier {
            Some(c) => Some(serde_json::to_value(c)?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, items, shipping, payment_method,
                payment_status, status, courier, total, shipping_charge, discount, coupon_code,
                hidden_from_user, hidden_from_admin, delivered_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(serde_json::to_value(&order.items)?)
        .bind(serde_json::to_value(&order.shipping)?)
        .bind(enum_to_str(&order.payment_method)?)
        .bind(enum_to_str(&order.payment_status)?)
        .bind(order.status.to_string())
        .bind(courier)
        .bind(order.total)
        .bind(order.shipping_charge)
        .bind(order.discount)
        .bind(&order.coupon_code)
        .bind(order.visibility.hidden_from_user)
        .bind(order.visibility.hidden_from_admin)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into_order()?)),
            None => Ok(None),
        }
    }

    async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let hidden_column = match viewer {
            Party::Customer => "hidden_from_user",
            Party::Admin => "hidden_from_admin",
        };
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE customer_id = $1 AND NOT {} \
             ORDER BY created_at DESC",
            ORDER_COLUMNS, hidden_column
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn update(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let courier = match &order.courier {
            Some(c) => Some(serde_json::to_value(c)?),
            None => None,
        };
        sqlx::query(
            r#"
            UPDATE orders SET payment_status = $2, status = $3, courier = $4,
                hidden_from_user = $5, hidden_from_admin = $6, delivered_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(enum_to_str(&order.payment_status)?)
        .bind(order.status.to_string())
        .bind(courier)
        .bind(order.visibility.hidden_from_user)
        .bind(order.visibility.hidden_from_admin)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_courier(
        &self,
        id: Uuid,
        shipment: &CourierShipment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("UPDATE orders SET courier = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(serde_json::to_value(shipment)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn attach_courier(
        &self,
        id: Uuid,
        shipment: &CourierShipment,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        // The precondition is evaluated at write time: the shipment only
        // lands when no tracking id is present.
        let result = sqlx::query(
            r#"
            UPDATE orders SET courier = $2, updated_at = NOW()
            WHERE id = $1
              AND (courier IS NULL OR COALESCE(courier ->> 'tracking_id', '') = '')
            "#,
        )
        .bind(id)
        .bind(serde_json::to_value(shipment)?)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($2)",
        )
        .bind(id)
        .bind(statuses_as_text(from))
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_outstanding(
        &self,
        limit: u32,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders \
             WHERE courier IS NOT NULL AND COALESCE(courier ->> 'tracking_id', '') <> '' \
               AND status NOT IN ('delivered', 'cancelled', 'returned') \
             ORDER BY updated_at ASC LIMIT $1",
            ORDER_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn purge_hidden(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("DELETE FROM orders WHERE hidden_from_user AND hidden_from_admin")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
