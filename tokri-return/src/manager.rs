use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use tokri_catalog::coupon::{CouponError, CouponMint};
use tokri_catalog::inventory::StockRepository;
use tokri_core::activity::{record, ActivityEntry, ActivityLogRepository};
use tokri_core::events::{DomainEvent, EventBus};
use tokri_core::visibility::{Party, VisibilityError};
use tokri_courier::gateway::{CourierApi, CourierError, PickupRequest};
use tokri_courier::status::map_status;

use tokri_order::models::{CourierShipment, Order, OrderStatus};
use tokri_order::repository::OrderRepository;

use crate::models::{
    NewReturn, RefundType, ReturnItem, ReturnRequest, ReturnStatus,
};
use crate::repository::ReturnRepository;

#[derive(Debug, thiserror::Error)]
pub enum ReturnError {
    #[error("Return request not found: {0}")]
    NotFound(Uuid),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Order is not delivered or the return window has closed")]
    OutOfWindow,

    #[error("Returned item does not match the order: {0}")]
    ItemNotInOrder(String),

    #[error("A rejection reason is required")]
    ReasonRequired,

    #[error("Refund type must be 'refund' or 'coupon'")]
    InvalidRefundChoice,

    #[error("Not eligible for deletion: {0}")]
    NotEligibleForDeletion(String),

    #[error(transparent)]
    Courier(#[from] CourierError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<VisibilityError> for ReturnError {
    fn from(e: VisibilityError) -> Self {
        match e {
            VisibilityError::NotEligibleForDeletion(msg) => {
                ReturnError::NotEligibleForDeletion(msg)
            }
        }
    }
}

fn store_err(e: Box<dyn std::error::Error + Send + Sync>) -> ReturnError {
    ReturnError::Store(e.to_string())
}

/// Owns return-request state transitions, stock restoration, refund
/// instrument issuance, and its own courier pickup dispatch.
pub struct ReturnManager {
    returns: Arc<dyn ReturnRepository>,
    orders: Arc<dyn OrderRepository>,
    stock: Arc<dyn StockRepository>,
    coupons: CouponMint,
    courier: Arc<dyn CourierApi>,
    activity: Arc<dyn ActivityLogRepository>,
    events: EventBus,
    partner: String,
    window_days: i64,
}

impl ReturnManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        returns: Arc<dyn ReturnRepository>,
        orders: Arc<dyn OrderRepository>,
        stock: Arc<dyn StockRepository>,
        coupons: CouponMint,
        courier: Arc<dyn CourierApi>,
        activity: Arc<dyn ActivityLogRepository>,
        events: EventBus,
        partner: String,
        window_days: i64,
    ) -> Self {
        Self {
            returns,
            orders,
            stock,
            coupons,
            courier,
            activity,
            events,
            partner,
            window_days,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<ReturnRequest, ReturnError> {
        self.returns
            .fetch(id)
            .await
            .map_err(store_err)?
            .ok_or(ReturnError::NotFound(id))
    }

    pub async fn list_for_order(&self, order_id: Uuid) -> Result<Vec<ReturnRequest>, ReturnError> {
        self.returns.list_for_order(order_id).await.map_err(store_err)
    }

    pub async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<ReturnRequest>, ReturnError> {
        self.returns
            .list_for_customer(customer_id, viewer)
            .await
            .map_err(store_err)
    }

    /// File a return against a delivered order. Rejected with
    /// `OutOfWindow` when the order is not delivered or the window has
    /// closed; items are snapshotted from the order, not trusted from
    /// the caller.
    pub async fn file(&self, new: NewReturn) -> Result<ReturnRequest, ReturnError> {
        let order = self
            .orders
            .fetch(new.order_id)
            .await
            .map_err(store_err)?
            .ok_or(ReturnError::OrderNotFound(new.order_id))?;

        // Filing against someone else's order reads as not-found
        if order.customer_id != new.customer_id {
            return Err(ReturnError::OrderNotFound(new.order_id));
        }
        if order.status != OrderStatus::Delivered {
            return Err(ReturnError::OutOfWindow);
        }
        let anchor = order.delivered_at.unwrap_or(order.updated_at);
        if Utc::now() - anchor > Duration::days(self.window_days) {
            return Err(ReturnError::OutOfWindow);
        }

        let items = snapshot_items(&order, &new)?;
        let request = ReturnRequest::new(order.id, new.customer_id, items);
        self.returns.insert(&request).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(
                &format!("customer:{}", request.customer_id),
                "return_filed",
                "return",
            )
            .entity_id(request.id)
            .meta(serde_json::json!({ "order_id": order.id })),
        )
        .await;
        self.emit_stage(&request, ReturnStatus::Pending);

        Ok(request)
    }

    /// Approve a pending request, then try to book the courier pickup.
    /// Pickup failure is recorded on the request but never blocks the
    /// approval itself; `schedule_pickup` retries it later.
    pub async fn approve(&self, id: Uuid, actor: &str) -> Result<ReturnRequest, ReturnError> {
        let request = self.get(id).await?;
        let moved = self
            .returns
            .transition_status(id, &[ReturnStatus::Pending], ReturnStatus::Approved)
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::Approved.to_string(),
            });
        }

        let mut request = self.get(id).await?;
        request.approved_at = Some(Utc::now());
        request.touch();
        self.returns.update(&request).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_approved", "return").entity_id(id),
        )
        .await;
        self.emit_stage(&request, ReturnStatus::Approved);

        match self.book_pickup(&request, actor).await {
            Ok(request) => Ok(request),
            Err(e) => {
                tracing::warn!(return_id = %id, "pickup booking failed: {}", e);
                self.get(id).await
            }
        }
    }

    /// Manual retry of a failed pickup booking.
    pub async fn schedule_pickup(&self, id: Uuid, actor: &str) -> Result<ReturnRequest, ReturnError> {
        let request = self.get(id).await?;
        if request.status != ReturnStatus::Approved {
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::PickupScheduled.to_string(),
            });
        }
        self.book_pickup(&request, actor).await
    }

    async fn book_pickup(
        &self,
        request: &ReturnRequest,
        actor: &str,
    ) -> Result<ReturnRequest, ReturnError> {
        let order = self
            .orders
            .fetch(request.order_id)
            .await
            .map_err(store_err)?
            .ok_or(ReturnError::OrderNotFound(request.order_id))?;

        let pickup_request = PickupRequest {
            invoice: order.invoice(),
            pickup_address: format!("{}, {}", order.shipping.address, order.shipping.city),
            pickup_phone: order.shipping.phone.clone(),
            note: None,
        };

        match self.courier.request_return_pickup(&pickup_request).await {
            Ok(result) => {
                let moved = self
                    .returns
                    .transition_status(
                        request.id,
                        &[ReturnStatus::Approved],
                        ReturnStatus::PickupScheduled,
                    )
                    .await
                    .map_err(store_err)?;
                if !moved {
                    return Err(ReturnError::InvalidTransition {
                        from: request.status.to_string(),
                        to: ReturnStatus::PickupScheduled.to_string(),
                    });
                }

                let mut request = self.get(request.id).await?;
                request.pickup = Some(CourierShipment {
                    partner: self.partner.clone(),
                    consignment_id: Some(result.consignment_id),
                    tracking_id: result.tracking_code,
                    status_raw: result.status_raw.clone(),
                    status_friendly: map_status(&result.status_raw),
                    delivery_charge: 0,
                    last_synced_at: Utc::now(),
                    error: None,
                });
                request.pickup_scheduled_at = Some(Utc::now());
                request.touch();
                self.returns.update(&request).await.map_err(store_err)?;

                record(
                    self.activity.as_ref(),
                    ActivityEntry::new(actor, "return_pickup_scheduled", "return")
                        .entity_id(request.id),
                )
                .await;
                self.emit_stage(&request, ReturnStatus::PickupScheduled);
                Ok(request)
            }
            Err(e) => {
                // Keep the error on the request so an operator can see
                // why the parcel never got a rider.
                let mut request = self.get(request.id).await?;
                let mut pickup = request.pickup.take().unwrap_or(CourierShipment {
                    partner: self.partner.clone(),
                    consignment_id: None,
                    tracking_id: String::new(),
                    status_raw: String::new(),
                    status_friendly: map_status(""),
                    delivery_charge: 0,
                    last_synced_at: Utc::now(),
                    error: None,
                });
                pickup.error = Some(e.to_string());
                request.pickup = Some(pickup);
                request.touch();
                self.returns.update(&request).await.map_err(store_err)?;
                Err(e.into())
            }
        }
    }

    /// Reject a pending request. Terminal; the reason is mandatory.
    pub async fn reject(&self, id: Uuid, reason: &str, actor: &str) -> Result<ReturnRequest, ReturnError> {
        if reason.trim().is_empty() {
            return Err(ReturnError::ReasonRequired);
        }

        let request = self.get(id).await?;
        let moved = self
            .returns
            .transition_status(id, &[ReturnStatus::Pending], ReturnStatus::Rejected)
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::Rejected.to_string(),
            });
        }

        let mut request = self.get(id).await?;
        request.rejected_at = Some(Utc::now());
        request.reject_reason = Some(reason.to_string());
        request.touch();
        self.returns.update(&request).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_rejected", "return")
                .entity_id(id)
                .meta(serde_json::json!({ "reason": reason })),
        )
        .await;
        self.emit_stage(&request, ReturnStatus::Rejected);
        Ok(request)
    }

    /// The parcel is on its way back with the courier.
    pub async fn mark_in_transit(&self, id: Uuid, actor: &str) -> Result<ReturnRequest, ReturnError> {
        let request = self.get(id).await?;
        let moved = self
            .returns
            .transition_status(id, &[ReturnStatus::PickupScheduled], ReturnStatus::InTransit)
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::InTransit.to_string(),
            });
        }

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_in_transit", "return").entity_id(id),
        )
        .await;
        let request = self.get(id).await?;
        self.emit_stage(&request, ReturnStatus::InTransit);
        Ok(request)
    }

    /// Goods are back in the warehouse: restore stock for every returned
    /// line, the inverse of the decrement taken at checkout.
    pub async fn mark_received(&self, id: Uuid, actor: &str) -> Result<ReturnRequest, ReturnError> {
        let request = self.get(id).await?;
        let moved = self
            .returns
            .transition_status(
                id,
                &[
                    ReturnStatus::Approved,
                    ReturnStatus::PickupScheduled,
                    ReturnStatus::InTransit,
                ],
                ReturnStatus::Received,
            )
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::Received.to_string(),
            });
        }

        for item in &request.items {
            self.stock
                .restore(item.product_id, item.qty)
                .await
                .map_err(store_err)?;
        }

        let mut request = self.get(id).await?;
        request.received_at = Some(Utc::now());
        request.touch();
        self.returns.update(&request).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_received", "return").entity_id(id),
        )
        .await;
        self.emit_stage(&request, ReturnStatus::Received);
        Ok(request)
    }

    /// Close the request with the chosen refund instrument. Irreversible.
    /// The amount comes from the snapshotted item prices taken at filing
    /// time, never from the live order.
    pub async fn complete(
        &self,
        id: Uuid,
        refund_type: RefundType,
        actor: &str,
    ) -> Result<ReturnRequest, ReturnError> {
        if !matches!(refund_type, RefundType::Refund | RefundType::Coupon) {
            return Err(ReturnError::InvalidRefundChoice);
        }

        let request = self.get(id).await?;
        if request.status != ReturnStatus::Received {
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::Completed.to_string(),
            });
        }

        // Mint before the irreversible transition so a mint failure
        // cannot strand a completed return without its instrument.
        let refund_amount = request.refund_total();
        let coupon_code = if refund_type == RefundType::Coupon {
            Some(self.coupons.mint_refund(refund_amount).await?.code)
        } else {
            None
        };

        let moved = self
            .returns
            .transition_status(id, &[ReturnStatus::Received], ReturnStatus::Completed)
            .await
            .map_err(store_err)?;
        if !moved {
            tracing::warn!(return_id = %id, "completion raced; minted coupon left unattached");
            return Err(ReturnError::InvalidTransition {
                from: request.status.to_string(),
                to: ReturnStatus::Completed.to_string(),
            });
        }

        let mut request = self.get(id).await?;
        request.refund_amount = refund_amount;
        request.refund_type = refund_type;
        request.coupon_code = coupon_code;
        request.completed_at = Some(Utc::now());
        request.touch();
        self.returns.update(&request).await.map_err(store_err)?;

        // The parent order's goods came back; flip it off `delivered`.
        let _ = self
            .orders
            .transition_status(
                request.order_id,
                &[OrderStatus::Delivered],
                OrderStatus::Returned,
            )
            .await
            .map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_completed", "return")
                .entity_id(id)
                .meta(serde_json::json!({
                    "refund_type": request.refund_type,
                    "refund_amount": request.refund_amount,
                    "coupon_code": request.coupon_code,
                })),
        )
        .await;
        self.emit_stage(&request, ReturnStatus::Completed);
        Ok(request)
    }

    /// Soft delete on behalf of one party; only their own flag moves.
    pub async fn soft_delete(
        &self,
        id: Uuid,
        party: Party,
        actor: &str,
    ) -> Result<ReturnRequest, ReturnError> {
        let mut request = self.get(id).await?;
        request.visibility.hide(party, request.status.deletable())?;
        request.touch();
        self.returns.update(&request).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_hidden", "return")
                .entity_id(id)
                .meta(serde_json::json!({ "party": party })),
        )
        .await;
        Ok(request)
    }

    /// Permanent removal of a single request; requires both flags.
    pub async fn purge(&self, id: Uuid, actor: &str) -> Result<(), ReturnError> {
        let request = self.get(id).await?;
        if !request.visibility.purge_eligible() {
            return Err(ReturnError::NotEligibleForDeletion(
                "both parties must delete first".to_string(),
            ));
        }
        self.returns.delete(id).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "return_purged", "return").entity_id(id),
        )
        .await;
        Ok(())
    }

    pub async fn purge_hidden(&self, actor: &str) -> Result<u64, ReturnError> {
        let removed = self.returns.purge_hidden().await.map_err(store_err)?;
        if removed > 0 {
            record(
                self.activity.as_ref(),
                ActivityEntry::new(actor, "returns_purged", "return")
                    .meta(serde_json::json!({ "removed": removed })),
            )
            .await;
        }
        Ok(removed)
    }

    fn emit_stage(&self, request: &ReturnRequest, stage: ReturnStatus) {
        self.events.emit(DomainEvent::ReturnStageChanged {
            return_id: request.id,
            order_id: request.order_id,
            stage: stage.to_string(),
        });
    }
}

/// Resolve the caller's drafts against the order's own lines. Quantity
/// may not exceed what was bought; price and title come from the order.
fn snapshot_items(order: &Order, new: &NewReturn) -> Result<Vec<ReturnItem>, ReturnError> {
    let mut items = Vec::with_capacity(new.items.len());
    for draft in &new.items {
        let line = order
            .items
            .iter()
            .find(|i| i.product_id == draft.product_id && i.variant_id == draft.variant_id)
            .ok_or_else(|| ReturnError::ItemNotInOrder(draft.product_id.to_string()))?;
        if draft.qty == 0 || draft.qty > line.qty {
            return Err(ReturnError::ItemNotInOrder(format!(
                "qty {} out of range for {}",
                draft.qty, draft.product_id
            )));
        }
        items.push(ReturnItem {
            product_id: line.product_id,
            variant_id: line.variant_id,
            qty: draft.qty,
            unit_price: line.unit_price,
            title: line.title.clone(),
            reason: draft.reason.clone(),
        });
    }
    if items.is_empty() {
        return Err(ReturnError::ItemNotInOrder("no items".to_string()));
    }
    Ok(items)
}
