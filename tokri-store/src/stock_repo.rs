use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tokri_catalog::inventory::StockRepository;

pub struct PgStockRepository {
    pool: PgPool,
}

impl PgStockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockRepository for PgStockRepository {
    async fn decrement_floor(
        &self,
        product_id: Uuid,
        qty: u32,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        // Single conditional write keeps the floor atomic under
        // concurrent checkouts.
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE products SET stock = GREATEST(stock - $2, 0) WHERE id = $1 RETURNING stock",
        )
        .bind(product_id)
        .bind(qty as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((stock,)) => Ok(stock),
            None => {
                tracing::warn!(product_id = %product_id, "stock decrement on unknown product");
                Ok(0)
            }
        }
    }

    async fn restore(
        &self,
        product_id: Uuid,
        qty: u32,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock",
        )
        .bind(product_id)
        .bind(qty as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((stock,)) => Ok(stock),
            None => {
                tracing::warn!(product_id = %product_id, "stock restore on unknown product");
                Ok(0)
            }
        }
    }

    async fn level(
        &self,
        product_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(s,)| s).unwrap_or(0))
    }
}
