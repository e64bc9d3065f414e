use tokio::sync::broadcast;
use uuid::Uuid;

/// Domain events emitted by the lifecycle managers. Delivery of
/// human-facing notifications happens outside this core; observers
/// subscribe through the bus and do their own fan-out.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced {
        order_id: Uuid,
        customer_id: String,
        total: i64,
    },
    OrderStatusChanged {
        order_id: Uuid,
        from: String,
        to: String,
    },
    ReturnStageChanged {
        return_id: Uuid,
        order_id: Uuid,
        stage: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event. Having no live subscribers is not an error.
    pub fn emit(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
