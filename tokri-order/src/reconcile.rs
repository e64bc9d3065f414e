use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use tokri_core::activity::{record, ActivityEntry};
use tokri_core::events::DomainEvent;
use tokri_courier::status::{map_status, FriendlyStatus};

use crate::manager::{OrderError, OrderManager};
use crate::models::OrderStatus;

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub synced: usize,
    pub failed: usize,
}

fn store_err(e: Box<dyn std::error::Error + Send + Sync>) -> OrderError {
    OrderError::Store(e.to_string())
}

impl OrderManager {
    /// Re-query the courier for one order and apply the one-way merge:
    /// friendly `Delivered` and `Cancelled` move the order, everything
    /// else only refreshes the courier sub-record's display fields.
    pub async fn reconcile(&self, id: Uuid) -> Result<FriendlyStatus, OrderError> {
        let order = self.get(id).await?;
        let Some(mut shipment) = order.courier.clone() else {
            return Err(OrderError::NotDispatched(id));
        };
        if shipment.tracking_id.is_empty() {
            return Err(OrderError::NotDispatched(id));
        }
        // Terminal orders stay where they are; the sub-record is already
        // the partner's last word.
        if order.status.is_terminal() {
            return Ok(shipment.status_friendly);
        }

        let raw = match self.courier.query_status(&shipment.tracking_id).await {
            Ok(raw) => raw,
            Err(e) => {
                shipment.error = Some(e.to_string());
                self.orders
                    .update_courier(id, &shipment)
                    .await
                    .map_err(store_err)?;
                return Err(e.into());
            }
        };

        let friendly = map_status(&raw);
        shipment.status_raw = raw;
        shipment.status_friendly = friendly;
        shipment.last_synced_at = Utc::now();
        shipment.error = None;
        self.orders
            .update_courier(id, &shipment)
            .await
            .map_err(store_err)?;

        match friendly {
            FriendlyStatus::Delivered => {
                let moved = self
                    .orders
                    .transition_status(
                        id,
                        &[
                            OrderStatus::Pending,
                            OrderStatus::Confirmed,
                            OrderStatus::Shipped,
                        ],
                        OrderStatus::Delivered,
                    )
                    .await
                    .map_err(store_err)?;
                if moved {
                    self.finish_delivery(id).await?;
                    record(
                        self.activity.as_ref(),
                        ActivityEntry::new("system:reconciler", "order_delivered", "order")
                            .entity_id(id),
                    )
                    .await;
                    self.events.emit(DomainEvent::OrderStatusChanged {
                        order_id: id,
                        from: order.status.to_string(),
                        to: OrderStatus::Delivered.to_string(),
                    });
                }
            }
            FriendlyStatus::Cancelled => {
                self.apply_cancel(
                    &order,
                    &[
                        OrderStatus::Pending,
                        OrderStatus::Confirmed,
                        OrderStatus::Shipped,
                    ],
                    "courier reported cancelled",
                    "system:reconciler",
                )
                .await?;
            }
            _ => {}
        }

        Ok(friendly)
    }

    /// Sweep a bounded batch of orders with outstanding shipments. One
    /// order's courier error never aborts the rest of the batch.
    pub async fn sweep(&self, batch: u32) -> Result<SweepReport, OrderError> {
        let outstanding = self
            .orders
            .list_outstanding(batch)
            .await
            .map_err(store_err)?;

        let mut report = SweepReport {
            scanned: outstanding.len(),
            ..Default::default()
        };

        for order in outstanding {
            match self.reconcile(order.id).await {
                Ok(_) => report.synced += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(order_id = %order.id, "reconciliation failed: {}", e);
                }
            }
        }

        Ok(report)
    }
}
