use async_trait::async_trait;
use uuid::Uuid;

use tokri_core::visibility::Party;

use crate::models::{CourierShipment, Order, OrderStatus};

/// Order persistence. Implementations must provide the conditional-write
/// semantics the lifecycle manager leans on: `attach_courier` and
/// `transition_status` check their precondition at write time, not at
/// read time, so concurrent callers cannot both win.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn fetch(
        &self,
        id: Uuid,
    ) -> Result<Option<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// A customer's orders as one party sees them: records that party
    /// has hidden are omitted, the other party's flag is ignored.
    async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// Whole-record write for manager-owned mutations (visibility flags,
    /// delivery effects). Does not bypass the conditional guards below.
    async fn update(
        &self,
        order: &Order,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Targeted write of the courier sub-record's display fields.
    async fn update_courier(
        &self,
        id: Uuid,
        shipment: &CourierShipment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Attach a shipment iff the order has no tracking id yet. Returns
    /// false when another dispatch already won.
    async fn attach_courier(
        &self,
        id: Uuid,
        shipment: &CourierShipment,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Move `id` to `to` iff its current status is one of `from`.
    /// Returns false when the precondition no longer holds.
    async fn transition_status(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Orders with an outstanding shipment: tracking attached and status
    /// not yet terminal. Bounded for the reconciliation sweep.
    async fn list_outstanding(
        &self,
        limit: u32,
    ) -> Result<Vec<Order>, Box<dyn std::error::Error + Send + Sync>>;

    /// Remove every order both parties have hidden. Safe to run on an
    /// empty set; returns the number of records removed.
    async fn purge_hidden(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    async fn delete(&self, id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
