use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use tokri_catalog::coupon::CouponRepository;
use tokri_catalog::inventory::StockRepository;
use tokri_core::activity::{record, ActivityEntry, ActivityLogRepository};
use tokri_core::events::{DomainEvent, EventBus};
use tokri_core::visibility::{Party, VisibilityError};
use tokri_courier::gateway::{CourierApi, CourierError, ShipmentRequest};
use tokri_courier::status::map_status;

use crate::models::{CourierShipment, NewOrder, Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::repository::OrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order already dispatched: {0}")]
    AlreadyDispatched(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Delivery charge mismatch: client sent {expected}, order holds {actual}")]
    PriceMismatch { expected: i64, actual: i64 },

    #[error("Courier dispatch is only available for cash-on-delivery orders")]
    NotCashOnDelivery,

    #[error("Order has no outstanding shipment: {0}")]
    NotDispatched(Uuid),

    #[error("Not eligible for deletion: {0}")]
    NotEligibleForDeletion(String),

    #[error(transparent)]
    Courier(#[from] CourierError),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<VisibilityError> for OrderError {
    fn from(e: VisibilityError) -> Self {
        match e {
            VisibilityError::NotEligibleForDeletion(msg) => OrderError::NotEligibleForDeletion(msg),
        }
    }
}

fn store_err(e: Box<dyn std::error::Error + Send + Sync>) -> OrderError {
    OrderError::Store(e.to_string())
}

/// Owns order state transitions, courier dispatch idempotency and the
/// one-way reconciliation merge (see `reconcile.rs`).
pub struct OrderManager {
    pub(crate) orders: Arc<dyn OrderRepository>,
    pub(crate) stock: Arc<dyn StockRepository>,
    pub(crate) coupons: Arc<dyn CouponRepository>,
    pub(crate) courier: Arc<dyn CourierApi>,
    pub(crate) activity: Arc<dyn ActivityLogRepository>,
    pub(crate) events: EventBus,
    pub(crate) partner: String,
}

impl OrderManager {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        stock: Arc<dyn StockRepository>,
        coupons: Arc<dyn CouponRepository>,
        courier: Arc<dyn CourierApi>,
        activity: Arc<dyn ActivityLogRepository>,
        events: EventBus,
        partner: String,
    ) -> Self {
        Self {
            orders,
            stock,
            coupons,
            courier,
            activity,
            events,
            partner,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .fetch(id)
            .await
            .map_err(store_err)?
            .ok_or(OrderError::NotFound(id))
    }

    pub async fn list_for_customer(
        &self,
        customer_id: &str,
        viewer: Party,
    ) -> Result<Vec<Order>, OrderError> {
        self.orders
            .list_for_customer(customer_id, viewer)
            .await
            .map_err(store_err)
    }

    /// Create an order from checkout or an admin approval. Always starts
    /// `pending`; stock is taken up front, floored at zero.
    pub async fn create(&self, new: NewOrder, actor: &str) -> Result<Order, OrderError> {
        let order = Order::from_checkout(new);

        for item in &order.items {
            self.stock
                .decrement_floor(item.product_id, item.qty)
                .await
                .map_err(store_err)?;
        }

        self.orders.insert(&order).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "order_created", "order")
                .entity_id(order.id)
                .meta(serde_json::json!({ "total": order.total })),
        )
        .await;
        self.events.emit(DomainEvent::OrderPlaced {
            order_id: order.id,
            customer_id: order.customer_id.clone(),
            total: order.total,
        });

        Ok(order)
    }

    /// Admin acknowledgement without courier involvement. Confirming an
    /// already-confirmed order is a no-op.
    pub async fn confirm(&self, id: Uuid, actor: &str) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        if order.status == OrderStatus::Confirmed {
            return Ok(order);
        }

        let moved = self
            .orders
            .transition_status(id, &[OrderStatus::Pending], OrderStatus::Confirmed)
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Confirmed.to_string(),
            });
        }

        self.log_transition(actor, &order, OrderStatus::Confirmed, None).await;
        self.get(id).await
    }

    /// Create a shipment with the courier partner for this order.
    ///
    /// The tracking id is attached with a conditional write so two
    /// concurrent dispatch calls cannot both win; the loser sees
    /// `AlreadyDispatched`. A failed partner call on a still-`pending`
    /// order auto-cancels it rather than leaving it silently stuck.
    pub async fn dispatch(
        &self,
        id: Uuid,
        expected_charge: Option<i64>,
        actor: &str,
    ) -> Result<Order, OrderError> {
        let order = self.get(id).await?;

        if order.has_tracking() {
            return Err(OrderError::AlreadyDispatched(id));
        }
        if !order.status.can_dispatch() {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Confirmed.to_string(),
            });
        }
        if order.payment_method != PaymentMethod::Cod {
            return Err(OrderError::NotCashOnDelivery);
        }
        if let Some(expected) = expected_charge {
            if expected != order.shipping_charge {
                return Err(OrderError::PriceMismatch {
                    expected,
                    actual: order.shipping_charge,
                });
            }
        }

        let request = ShipmentRequest {
            invoice: order.invoice(),
            recipient_name: order.shipping.name.clone(),
            recipient_phone: order.shipping.phone.clone(),
            recipient_address: format!("{}, {}", order.shipping.address, order.shipping.city),
            cod_amount: order.total,
            note: None,
        };

        match self.courier.dispatch(&request).await {
            Ok(result) => {
                let shipment = CourierShipment {
                    partner: self.partner.clone(),
                    consignment_id: Some(result.consignment_id),
                    tracking_id: result.tracking_code,
                    status_raw: result.status_raw.clone(),
                    status_friendly: map_status(&result.status_raw),
                    delivery_charge: order.shipping_charge,
                    last_synced_at: Utc::now(),
                    error: None,
                };

                let attached = self
                    .orders
                    .attach_courier(id, &shipment)
                    .await
                    .map_err(store_err)?;
                if !attached {
                    return Err(OrderError::AlreadyDispatched(id));
                }

                let moved = self
                    .orders
                    .transition_status(id, &[OrderStatus::Pending], OrderStatus::Confirmed)
                    .await
                    .map_err(store_err)?;

                record(
                    self.activity.as_ref(),
                    ActivityEntry::new(actor, "order_dispatched", "order")
                        .entity_id(id)
                        .meta(serde_json::json!({
                            "tracking_id": shipment.tracking_id,
                            "partner": shipment.partner,
                        })),
                )
                .await;
                if moved {
                    self.events.emit(DomainEvent::OrderStatusChanged {
                        order_id: id,
                        from: OrderStatus::Pending.to_string(),
                        to: OrderStatus::Confirmed.to_string(),
                    });
                }

                self.get(id).await
            }
            Err(e) => {
                // Fail fast: a pending order whose dispatch failed must
                // not linger as if nothing happened.
                if order.status == OrderStatus::Pending {
                    self.apply_cancel(
                        &order,
                        &[OrderStatus::Pending],
                        "courier dispatch failed",
                        actor,
                    )
                    .await?;
                }
                Err(e.into())
            }
        }
    }

    /// Manual cancellation. Cancelling an already-cancelled order is a
    /// no-op; returns whether this call performed the transition.
    pub async fn cancel(&self, id: Uuid, reason: &str, actor: &str) -> Result<bool, OrderError> {
        let order = self.get(id).await?;
        if order.status == OrderStatus::Cancelled {
            return Ok(false);
        }
        if !order.status.can_dispatch() {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }
        self.apply_cancel(
            &order,
            &[OrderStatus::Pending, OrderStatus::Confirmed],
            reason,
            actor,
        )
        .await
    }

    /// The cancel transition with its side effects. Stock restore and
    /// coupon release ride the conditional status write, so they fire at
    /// most once no matter how many callers race here.
    pub(crate) async fn apply_cancel(
        &self,
        order: &Order,
        allowed_from: &[OrderStatus],
        reason: &str,
        actor: &str,
    ) -> Result<bool, OrderError> {
        let moved = self
            .orders
            .transition_status(order.id, allowed_from, OrderStatus::Cancelled)
            .await
            .map_err(store_err)?;
        if !moved {
            return Ok(false);
        }

        for item in &order.items {
            self.stock
                .restore(item.product_id, item.qty)
                .await
                .map_err(store_err)?;
        }
        if let Some(code) = &order.coupon_code {
            self.coupons.release_usage(code).await.map_err(store_err)?;
        }

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "order_cancelled", "order")
                .entity_id(order.id)
                .meta(serde_json::json!({ "reason": reason })),
        )
        .await;
        self.events.emit(DomainEvent::OrderStatusChanged {
            order_id: order.id,
            from: order.status.to_string(),
            to: OrderStatus::Cancelled.to_string(),
        });

        Ok(true)
    }

    /// Manual `confirmed → shipped` for parcels moving outside the
    /// integrated courier.
    pub async fn mark_shipped(&self, id: Uuid, actor: &str) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        let moved = self
            .orders
            .transition_status(id, &[OrderStatus::Confirmed], OrderStatus::Shipped)
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Shipped.to_string(),
            });
        }
        self.log_transition(actor, &order, OrderStatus::Shipped, None).await;
        self.get(id).await
    }

    /// Manual delivery confirmation. COD collection is assumed complete.
    pub async fn mark_delivered(&self, id: Uuid, actor: &str) -> Result<Order, OrderError> {
        let order = self.get(id).await?;
        let moved = self
            .orders
            .transition_status(
                id,
                &[OrderStatus::Confirmed, OrderStatus::Shipped],
                OrderStatus::Delivered,
            )
            .await
            .map_err(store_err)?;
        if !moved {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::Delivered.to_string(),
            });
        }
        self.finish_delivery(id).await?;
        self.log_transition(actor, &order, OrderStatus::Delivered, None).await;
        self.get(id).await
    }

    /// Post-transition delivery effects shared with reconciliation.
    pub(crate) async fn finish_delivery(&self, id: Uuid) -> Result<(), OrderError> {
        let mut order = self.get(id).await?;
        order.payment_status = PaymentStatus::Paid;
        order.delivered_at = Some(Utc::now());
        order.touch();
        self.orders.update(&order).await.map_err(store_err)
    }

    /// Soft delete on behalf of one party; only their own flag moves.
    pub async fn soft_delete(&self, id: Uuid, party: Party, actor: &str) -> Result<Order, OrderError> {
        let mut order = self.get(id).await?;
        order.visibility.hide(party, order.status.deletable())?;
        order.touch();
        self.orders.update(&order).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "order_hidden", "order")
                .entity_id(id)
                .meta(serde_json::json!({ "party": party })),
        )
        .await;
        Ok(order)
    }

    /// Permanent removal of a single order; requires both flags.
    pub async fn purge(&self, id: Uuid, actor: &str) -> Result<(), OrderError> {
        let order = self.get(id).await?;
        if !order.visibility.purge_eligible() {
            return Err(OrderError::NotEligibleForDeletion(
                "both parties must delete first".to_string(),
            ));
        }
        self.orders.delete(id).await.map_err(store_err)?;

        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, "order_purged", "order").entity_id(id),
        )
        .await;
        Ok(())
    }

    /// Bulk purge over the dual-consent set. Idempotent; an empty set is
    /// not an error.
    pub async fn purge_hidden(&self, actor: &str) -> Result<u64, OrderError> {
        let removed = self.orders.purge_hidden().await.map_err(store_err)?;
        if removed > 0 {
            record(
                self.activity.as_ref(),
                ActivityEntry::new(actor, "orders_purged", "order")
                    .meta(serde_json::json!({ "removed": removed })),
            )
            .await;
        }
        Ok(removed)
    }

    async fn log_transition(
        &self,
        actor: &str,
        before: &Order,
        to: OrderStatus,
        meta: Option<serde_json::Value>,
    ) {
        record(
            self.activity.as_ref(),
            ActivityEntry::new(actor, &format!("order_{}", to), "order")
                .entity_id(before.id)
                .meta(meta.unwrap_or_else(|| serde_json::json!({}))),
        )
        .await;
        self.events.emit(DomainEvent::OrderStatusChanged {
            order_id: before.id,
            from: before.status.to_string(),
            to: to.to_string(),
        });
    }
}
