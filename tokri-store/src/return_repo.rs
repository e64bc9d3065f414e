use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tokri_core::visibility::{Party, Visibility};
use tokri_order::models::CourierShipment;
use tokri_return::models::{ReturnRequest, ReturnStatus};
use tokri_return::repository::ReturnRepository;

use crate::order_repo::{enum_from_str, enum_to_str};

pub struct PgReturnRepository {
    pool: PgPool,
}

impl PgReturnRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RETURN_COLUMNS: &str = "id, order_id, customer_id, items, status, refund_type, \
     refund_amount, coupon_code, pickup, reject_reason, approved_at, rejected_at, \
     pickup_scheduled_at, received_at, completed_at, hidden_from_user, hidden_from_admin, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReturnRow {
    id: Uuid,
    order_id: Uuid,
    customer_id: String,
    items: serde_json::Value,
    status: String,
    refund_type: String,
    refund_amount: i64,
    coupon_code: Option<String>,
    pickup: Option<serde_json::Value>,
    reject_reason: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    pickup_scheduled_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    hidden_from_user: bool,
    hidden_from_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReturnRow {
    fn into_request(self) -> Result<ReturnRequest, Box<dyn std::error::Error + Send + Sync>> {
        let pickup: Option<CourierShipment> = match self.pickup {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        Ok(ReturnRequest {
            id: self.id,
            order_id: self.order_id,
            customer_id: self.customer_id,
            items: serde_json::from_value(self.items)?,
            status: enum_from_str(&self.status)?,
            refund_type: enum_from_str(&self.refund_type)?,
            refund_amount: self.refund_amount,
            coupon_code: self.coupon_code,
            pickup,
            reject_reason: self.reject_reason,
            approved_at: self.approved_at,
            rejected_at: self.rejected_at,
            pickup_scheduled_at: self.pickup_scheduled_at,
            received_at: self.received_at,
            completed_at: self.completed_at,
            visibility: Visibility {
                hidden_from_user: self.hidden_from_user,
                hidden_from_admin: self.hidden_from_admin,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl ReturnRepository for PgReturnRepository {
    async fn insert(
        &self,
        request: &ReturnRequest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let pickup = match &request.pickup {
            Some(p) => Some(serde_json::to_value(p)?),
            None => None,
        };
        sqlx::query(
            r#"
            INSERT INTO return_requests (id, order_id, customer_id, items, status, refund_type,
                refund_amount, coupon_code, pickup, reject_reason, approved_at, rejected_at,
                pickup_scheduled_at, received_at, completed_at, hidden_from_user,
                hidden_from_admin, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19)
            "#,
        )
        .bind(request.id)
        .bind(request.order_id)
        .bind(&request.customer_id)
        .bind(serde_json::to_value(&request.items)?)
        .bind(request.status.to_string())
        .bind(enum_to_str(&request.refund_type)?)
        .bind(request.refund_amount)
        .bind(&request.coupon_code)
        .bind(pickup)
        .bind(&request.reject_reason)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.pickup_scheduled_at)
        .bind(request.received_at)
        .bind(request.completed_at)
        .bind(request.visibility.hidden_from_user)
        .bind(request.visibility.hidden_from_admin)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(
        &self,
        id: Uuid,
    ) -> Result<Option<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM return_requests WHERE id = $1",
            RETURN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into_request()?)),
            None => Ok(None),
        }
    }

    async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM return_requests WHERE order_id = $1 ORDER BY created_at DESC",
            RETURN_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReturnRow::into_request).collect()
    }

    async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>> {
        let hidden_column = match viewer {
            Party::Customer => "hidden_from_user",
            Party::Admin => "hidden_from_admin",
        };
        let rows = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM return_requests WHERE customer_id = $1 AND NOT {} \
             ORDER BY created_at DESC",
            RETURN_COLUMNS, hidden_column
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReturnRow::into_request).collect()
    }

    async fn update(
        &self,
        request: &ReturnRequest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let pickup = match &request.pickup {
            Some(p) => Some(serde_json::to_value(p)?),
            None => None,
        };
        sqlx::query(
            r#"
            UPDATE return_requests SET status = $2, refund_type = $3, refund_amount = $4,
                coupon_code = $5, pickup = $6, reject_reason = $7, approved_at = $8,
                rejected_at = $9, pickup_scheduled_at = $10, received_at = $11,
                completed_at = $12, hidden_from_user = $13, hidden_from_admin = $14,
                updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(request.status.to_string())
        .bind(enum_to_str(&request.refund_type)?)
        .bind(request.refund_amount)
        .bind(&request.coupon_code)
        .bind(pickup)
        .bind(&request.reject_reason)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(request.pickup_scheduled_at)
        .bind(request.received_at)
        .bind(request.completed_at)
        .bind(request.visibility.hidden_from_user)
        .bind(request.visibility.hidden_from_admin)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ReturnStatus],
        to: ReturnStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();
        let result = sqlx::query(
            "UPDATE return_requests SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($2)",
        )
        .bind(id)
        .bind(from)
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_hidden(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let result =
            sqlx::query("DELETE FROM return_requests WHERE hidden_from_user AND hidden_from_admin")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("DELETE FROM return_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
