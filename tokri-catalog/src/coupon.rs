use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A refund instrument: a single-use store-credit coupon minted when a
/// return completes with `refund_type = coupon`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub amount: i64,
    pub single_use: bool,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn refund(code: String, amount: i64) -> Self {
        Self {
            code,
            amount,
            single_use: true,
            used: false,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn code_exists(
        &self,
        code: &str,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    async fn insert(
        &self,
        coupon: &Coupon,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Revert a checkout's consumption of `code`. Called when an order is
    /// cancelled so a failed order never consumes a coupon permanently.
    async fn release_usage(
        &self,
        code: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Mints collision-checked coupon codes against the repository.
pub struct CouponMint {
    repo: std::sync::Arc<dyn CouponRepository>,
}

const MINT_ATTEMPTS: usize = 5;

impl CouponMint {
    pub fn new(repo: std::sync::Arc<dyn CouponRepository>) -> Self {
        Self { repo }
    }

    /// Mint a single-use refund coupon for `amount`. Regenerates the code
    /// on collision, up to a bounded number of attempts.
    pub async fn mint_refund(&self, amount: i64) -> Result<Coupon, CouponError> {
        for _ in 0..MINT_ATTEMPTS {
            let code = generate_code();
            let exists = self
                .repo
                .code_exists(&code)
                .await
                .map_err(|e| CouponError::Store(e.to_string()))?;
            if exists {
                continue;
            }
            let coupon = Coupon::refund(code, amount);
            self.repo
                .insert(&coupon)
                .await
                .map_err(|e| CouponError::Store(e.to_string()))?;
            return Ok(coupon);
        }
        Err(CouponError::CodeSpaceExhausted)
    }
}

/// Format: RF-{uuid prefix}, uppercased for readability on invoices.
fn generate_code() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("RF-{}", raw[..10].to_uppercase())
}

#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("Could not find an unused coupon code")]
    CodeSpaceExhausted,

    #[error("Coupon store error: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MemoryCoupons {
        by_code: Mutex<HashMap<String, Coupon>>,
    }

    #[async_trait]
    impl CouponRepository for MemoryCoupons {
        async fn code_exists(
            &self,
            code: &str,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self.by_code.lock().unwrap().contains_key(code))
        }

        async fn insert(
            &self,
            coupon: &Coupon,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.by_code
                .lock()
                .unwrap()
                .insert(coupon.code.clone(), coupon.clone());
            Ok(())
        }

        async fn release_usage(
            &self,
            code: &str,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if let Some(c) = self.by_code.lock().unwrap().get_mut(code) {
                c.used = false;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mint_refund_coupon() {
        let repo = Arc::new(MemoryCoupons::default());
        let mint = CouponMint::new(repo.clone());

        let coupon = mint.mint_refund(450).await.unwrap();

        assert!(coupon.code.starts_with("RF-"));
        assert_eq!(coupon.amount, 450);
        assert!(coupon.single_use);
        assert!(repo.code_exists(&coupon.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_minted_codes_are_distinct() {
        let repo = Arc::new(MemoryCoupons::default());
        let mint = CouponMint::new(repo);

        let a = mint.mint_refund(100).await.unwrap();
        let b = mint.mint_refund(100).await.unwrap();

        assert_ne!(a.code, b.code);
    }
}
