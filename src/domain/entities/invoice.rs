use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Failed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Failed => "failed",
        }
    }
}

/// Local mirror of a Stripe invoice.
///
/// `amount_paid_cents` tracks the provider's reported value;
/// `attempt_count` is monotonic within a dunning cycle (the store keeps
/// the greater of the stored and incoming values on upsert).
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub stripe_invoice_id: String,
    pub user_id: Option<Uuid>,
    /// Local SubscriptionRecord id, resolved at ingestion time when the
    /// linked subscription is already known.
    pub subscription_id: Option<Uuid>,
    pub amount_due_cents: i64,
    pub amount_paid_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub attempt_count: i32,
    pub metadata: JsonValue,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
