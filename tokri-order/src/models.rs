use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use tokri_core::visibility::Visibility;
use tokri_courier::status::FriendlyStatus;

/// Order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Statuses from which a courier shipment may be created.
    pub fn can_dispatch(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Terminal with respect to reconciliation: once here, further ticks
    /// must not move the order.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned
        )
    }

    /// A party may only soft-delete an order that has finished its run.
    pub fn deletable(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Online,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// Recipient snapshot. Immutable once a shipment has been dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
}

/// An individual line within an order; title and price are snapshots
/// taken at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub qty: u32,
    pub unit_price: i64,
    pub title: String,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.qty as i64
    }
}

/// Courier sub-record attached on dispatch. Presence of `tracking_id`
/// is the idempotency guard against a second dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierShipment {
    pub partner: String,
    pub consignment_id: Option<i64>,
    pub tracking_id: String,
    pub status_raw: String,
    pub status_friendly: FriendlyStatus,
    pub delivery_charge: i64,
    pub last_synced_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: Option<String>,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub courier: Option<CourierShipment>,
    pub total: i64,
    pub shipping_charge: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub visibility: Visibility,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout payload accepted by the lifecycle manager.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer_id: String,
    pub order_number: Option<String>,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub shipping_charge: i64,
    pub discount: i64,
    pub coupon_code: Option<String>,
}

impl Order {
    pub fn from_checkout(new: NewOrder) -> Self {
        let now = Utc::now();
        let items_total: i64 = new.items.iter().map(OrderItem::line_total).sum();
        Self {
            id: Uuid::new_v4(),
            order_number: new.order_number,
            customer_id: new.customer_id,
            items: new.items,
            shipping: new.shipping,
            payment_method: new.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending,
            courier: None,
            total: items_total + new.shipping_charge - new.discount,
            shipping_charge: new.shipping_charge,
            discount: new.discount,
            coupon_code: new.coupon_code,
            visibility: Visibility::default(),
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Identifier sent to the courier as the parcel invoice.
    pub fn invoice(&self) -> String {
        self.order_number
            .clone()
            .unwrap_or_else(|| self.id.simple().to_string()[..12].to_uppercase())
    }

    pub fn has_tracking(&self) -> bool {
        self.courier
            .as_ref()
            .map(|c| !c.tracking_id.is_empty())
            .unwrap_or(false)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_item(qty: u32, unit_price: i64) -> OrderItem {
        OrderItem {
            product_id: Uuid::new_v4(),
            variant_id: None,
            qty,
            unit_price,
            title: "Cotton Panjabi".to_string(),
        }
    }

    fn checkout(items: Vec<OrderItem>) -> NewOrder {
        NewOrder {
            customer_id: "cust-1".to_string(),
            order_number: None,
            items,
            shipping: ShippingAddress {
                name: "Rahim Uddin".to_string(),
                phone: "01700000000".to_string(),
                address: "House 7, Road 3, Banani".to_string(),
                city: "Dhaka".to_string(),
            },
            payment_method: PaymentMethod::Cod,
            shipping_charge: 80,
            discount: 50,
            coupon_code: Some("EID10".to_string()),
        }
    }

    #[test]
    fn test_checkout_totals() {
        let order = Order::from_checkout(checkout(vec![one_item(2, 400), one_item(1, 150)]));
        // 800 + 150 + 80 shipping - 50 discount
        assert_eq!(order.total, 980);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.courier.is_none());
    }

    #[test]
    fn test_status_predicates() {
        assert!(OrderStatus::Pending.can_dispatch());
        assert!(OrderStatus::Confirmed.can_dispatch());
        assert!(!OrderStatus::Shipped.can_dispatch());

        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());

        assert!(OrderStatus::Delivered.deletable());
        assert!(OrderStatus::Cancelled.deletable());
        assert!(!OrderStatus::Pending.deletable());
        assert!(!OrderStatus::Returned.deletable());
    }

    #[test]
    fn test_invoice_falls_back_to_id() {
        let mut order = Order::from_checkout(checkout(vec![one_item(1, 100)]));
        assert_eq!(order.invoice().len(), 12);

        order.order_number = Some("TKR-2024-001".to_string());
        assert_eq!(order.invoice(), "TKR-2024-001");
    }

    #[test]
    fn test_serde_status_names() {
        let json = serde_json::to_string(&OrderStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");

        let back: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(back, OrderStatus::Cancelled);
    }
}
