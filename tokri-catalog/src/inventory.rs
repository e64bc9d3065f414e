use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Stock mutations used by the order and return lifecycles.
///
/// Implementations must make each call atomic per product so concurrent
/// orders cannot oversell: decrement floors at zero rather than going
/// negative, restore is its exact inverse.
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// Subtract `qty`, flooring at zero. Returns the stock level after
    /// the write.
    async fn decrement_floor(
        &self,
        product_id: Uuid,
        qty: u32,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>>;

    /// Add `qty` back (return received, order cancelled). Returns the
    /// stock level after the write.
    async fn restore(
        &self,
        product_id: Uuid,
        qty: u32,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>>;

    async fn level(
        &self,
        product_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>>;
}

/// In-memory stock ledger. Backs the memory store and tests; the SQL
/// store performs the same operations as conditional writes.
pub struct StockLedger {
    levels: Mutex<HashMap<Uuid, i64>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self {
            levels: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, product_id: Uuid, qty: i64) {
        self.levels.lock().unwrap().insert(product_id, qty);
    }
}

impl Default for StockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockRepository for StockLedger {
    async fn decrement_floor(
        &self,
        product_id: Uuid,
        qty: u32,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let mut levels = self.levels.lock().unwrap();
        let level = levels.entry(product_id).or_insert(0);
        *level = (*level - qty as i64).max(0);
        Ok(*level)
    }

    async fn restore(
        &self,
        product_id: Uuid,
        qty: u32,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        let mut levels = self.levels.lock().unwrap();
        let level = levels.entry(product_id).or_insert(0);
        *level += qty as i64;
        Ok(*level)
    }

    async fn level(
        &self,
        product_id: Uuid,
    ) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(*self.levels.lock().unwrap().get(&product_id).unwrap_or(&0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decrement_floors_at_zero() {
        let ledger = StockLedger::new();
        let product = Uuid::new_v4();
        ledger.seed(product, 3);

        assert_eq!(ledger.decrement_floor(product, 2).await.unwrap(), 1);
        assert_eq!(ledger.decrement_floor(product, 5).await.unwrap(), 0);
        assert_eq!(ledger.level(product).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_restore_inverts_decrement() {
        let ledger = StockLedger::new();
        let product = Uuid::new_v4();
        ledger.seed(product, 10);

        ledger.decrement_floor(product, 4).await.unwrap();
        ledger.restore(product, 4).await.unwrap();

        assert_eq!(ledger.level(product).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unknown_product_defaults_to_zero() {
        let ledger = StockLedger::new();
        let product = Uuid::new_v4();

        assert_eq!(ledger.level(product).await.unwrap(), 0);
        assert_eq!(ledger.decrement_floor(product, 2).await.unwrap(), 0);
    }
}
