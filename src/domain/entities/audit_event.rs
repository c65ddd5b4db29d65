use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Append-only audit log entry.
///
/// One entry is written per processed inbound webhook event and one per
/// reconciliation run. Entries are never mutated or deleted; replayed
/// webhooks produce duplicate entries, which is acceptable.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// Namespaced type tag, e.g. "payment_intent.succeeded" or
    /// "reconciliation.payments.completed".
    pub event_type: String,
    pub payload: JsonValue,
    pub created_at: Option<NaiveDateTime>,
}
