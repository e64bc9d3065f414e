use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record. Every state transition in the fulfillment
/// core writes one of these before the caller sees the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(actor: &str, action: &str, entity: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.to_string(),
            action: action.to_string(),
            entity: entity.to_string(),
            entity_id: None,
            meta: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn entity_id(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Write-only sink consumed by the admin surface.
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    async fn append(
        &self,
        entry: &ActivityEntry,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Append an entry, swallowing sink failures. Used on paths where the log
/// must never mask or replace the outcome of the operation being logged.
pub async fn record(log: &dyn ActivityLogRepository, entry: ActivityEntry) {
    if let Err(e) = log.append(&entry).await {
        tracing::error!(action = %entry.action, "activity log write failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let id = Uuid::new_v4();
        let entry = ActivityEntry::new("admin:rafi", "order_cancelled", "order")
            .entity_id(id)
            .meta(serde_json::json!({ "reason": "customer request" }));

        assert_eq!(entry.actor, "admin:rafi");
        assert_eq!(entry.entity_id, Some(id));
        assert_eq!(entry.meta["reason"], "customer request");
    }
}
