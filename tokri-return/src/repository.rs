use async_trait::async_trait;
use uuid::Uuid;

use tokri_core::visibility::Party;

use crate::models::{ReturnRequest, ReturnStatus};

/// Return-request persistence. `transition_status` carries the same
/// conditional-write contract as the order repository: the precondition
/// is evaluated at write time.
#[async_trait]
pub trait ReturnRepository: Send + Sync {
    async fn insert(
        &self,
        request: &ReturnRequest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn fetch(
        &self,
        id: Uuid,
    ) -> Result<Option<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>>;

    /// Hidden-from-viewer records are omitted; the other party's flag
    /// is ignored.
    async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<ReturnRequest>, Box<dyn std::error::Error + Send + Sync>>;

    async fn update(
        &self,
        request: &ReturnRequest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Move `id` to `to` iff its current status is one of `from`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: &[ReturnStatus],
        to: ReturnStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Remove every request both parties have hidden; returns how many.
    async fn purge_hidden(&self) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;

    async fn delete(&self, id: Uuid) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
