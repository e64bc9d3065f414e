use serde::{Deserialize, Serialize};
use std::fmt;

/// The internal delivery-status vocabulary. The courier partner's raw
/// strings are partner-specific and untyped; everything downstream works
/// against this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendlyStatus {
    Pending,
    Picked,
    InTransit,
    Delivered,
    Cancelled,
}

impl FriendlyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FriendlyStatus::Delivered | FriendlyStatus::Cancelled)
    }
}

impl fmt::Display for FriendlyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FriendlyStatus::Pending => "Pending",
            FriendlyStatus::Picked => "Picked",
            FriendlyStatus::InTransit => "In Transit",
            FriendlyStatus::Delivered => "Delivered",
            FriendlyStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", label)
    }
}

const PENDING: &[&str] = &["pending", "in_review", "hold", "unknown"];
const PICKED: &[&str] = &["picked", "picked_up", "received_at_hub"];
const IN_TRANSIT: &[&str] = &["in_transit", "on_the_way", "out_for_delivery"];
const DELIVERED: &[&str] = &["delivered", "partial_delivered"];
const CANCELLED: &[&str] = &["cancelled"];

/// Map a raw partner status onto the internal vocabulary.
///
/// Total over all inputs: anything outside the allow-lists (including the
/// partner's `*_approval_pending` intermediates) falls back to `Pending`,
/// which reads as "needs attention" rather than a terminal state. Invoked
/// on every dispatch and every reconciliation tick, so it must stay pure.
pub fn map_status(raw: &str) -> FriendlyStatus {
    let normalized = raw.trim().to_lowercase();
    let s = normalized.as_str();

    if DELIVERED.contains(&s) {
        FriendlyStatus::Delivered
    } else if CANCELLED.contains(&s) {
        FriendlyStatus::Cancelled
    } else if IN_TRANSIT.contains(&s) {
        FriendlyStatus::InTransit
    } else if PICKED.contains(&s) {
        FriendlyStatus::Picked
    } else if PENDING.contains(&s) {
        FriendlyStatus::Pending
    } else {
        FriendlyStatus::Pending
    }
}
