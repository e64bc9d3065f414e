use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use tokri_core::visibility::Visibility;
use tokri_order::models::CourierShipment;

/// Return-request stage. Strictly forward: a request never moves back to
/// an earlier stage, and `rejected` is reachable only from `pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    PickupScheduled,
    InTransit,
    Received,
    Completed,
}

impl ReturnStatus {
    /// Stages from which the goods can be marked received.
    pub fn receivable(&self) -> bool {
        matches!(
            self,
            ReturnStatus::Approved | ReturnStatus::PickupScheduled | ReturnStatus::InTransit
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReturnStatus::Rejected | ReturnStatus::Completed)
    }

    /// A party may only soft-delete a request that has finished its run.
    pub fn deletable(&self) -> bool {
        self.is_terminal()
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::PickupScheduled => "pickup_scheduled",
            ReturnStatus::InTransit => "in_transit",
            ReturnStatus::Received => "received",
            ReturnStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// How the customer is made whole once the goods are back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    Pending,
    Refund,
    Coupon,
    None,
}

/// One returned line. Price and title are snapshots from the parent
/// order; the refund amount is computed from these, never from the live
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub qty: u32,
    pub unit_price: i64,
    pub title: String,
    pub reason: String,
}

impl ReturnItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.qty as i64
    }
}

/// What the customer submits when filing: which lines, and why.
#[derive(Debug, Clone, Deserialize)]
pub struct ReturnItemDraft {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub qty: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReturn {
    pub order_id: Uuid,
    pub customer_id: String,
    pub items: Vec<ReturnItemDraft>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: String,
    pub items: Vec<ReturnItem>,
    pub status: ReturnStatus,
    pub refund_type: RefundType,
    pub refund_amount: i64,
    pub coupon_code: Option<String>,
    /// Pickup consignment with the courier, parallel to the order's
    /// shipment sub-record.
    pub pickup: Option<CourierShipment>,
    pub reject_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub pickup_scheduled_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReturnRequest {
    pub fn new(order_id: Uuid, customer_id: String, items: Vec<ReturnItem>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            customer_id,
            items,
            status: ReturnStatus::Pending,
            refund_type: RefundType::Pending,
            refund_amount: 0,
            coupon_code: None,
            pickup: None,
            reject_reason: None,
            approved_at: None,
            rejected_at: None,
            pickup_scheduled_at: None,
            received_at: None,
            completed_at: None,
            visibility: Visibility::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refund value of the snapshotted lines.
    pub fn refund_total(&self) -> i64 {
        self.items.iter().map(ReturnItem::line_total).sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(items: Vec<(u32, i64)>) -> ReturnRequest {
        let items = items
            .into_iter()
            .map(|(qty, unit_price)| ReturnItem {
                product_id: Uuid::new_v4(),
                variant_id: None,
                qty,
                unit_price,
                title: "Deshi Gamcha".to_string(),
                reason: "wrong size".to_string(),
            })
            .collect();
        ReturnRequest::new(Uuid::new_v4(), "cust-9".to_string(), items)
    }

    #[test]
    fn test_refund_total_from_snapshot() {
        let request = request_with(vec![(2, 250), (1, 100)]);
        assert_eq!(request.refund_total(), 600);
    }

    #[test]
    fn test_new_request_starts_pending() {
        let request = request_with(vec![(1, 100)]);
        assert_eq!(request.status, ReturnStatus::Pending);
        assert_eq!(request.refund_type, RefundType::Pending);
        assert!(request.pickup.is_none());
        assert!(request.approved_at.is_none());
    }

    #[test]
    fn test_stage_predicates() {
        assert!(ReturnStatus::Approved.receivable());
        assert!(ReturnStatus::PickupScheduled.receivable());
        assert!(ReturnStatus::InTransit.receivable());
        assert!(!ReturnStatus::Pending.receivable());
        assert!(!ReturnStatus::Completed.receivable());

        assert!(ReturnStatus::Rejected.deletable());
        assert!(ReturnStatus::Completed.deletable());
        assert!(!ReturnStatus::Received.deletable());
    }
}
