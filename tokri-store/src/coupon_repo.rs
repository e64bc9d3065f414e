use async_trait::async_trait;
use sqlx::PgPool;

use tokri_catalog::coupon::{Coupon, CouponRepository};

pub struct PgCouponRepository {
    pool: PgPool,
}

impl PgCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponRepository for PgCouponRepository {
    async fn code_exists(
        &self,
        code: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM coupons WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert(
        &self,
        coupon: &Coupon,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO coupons (code, amount, single_use, used, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&coupon.code)
        .bind(coupon.amount)
        .bind(coupon.single_use)
        .bind(coupon.used)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_usage(
        &self,
        code: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("UPDATE coupons SET used = FALSE WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
