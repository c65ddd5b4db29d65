use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Map a Stripe payment-intent status onto the local status set.
    ///
    /// Stripe reports a wider range (`requires_payment_method`,
    /// `processing`, ...); everything that is neither settled nor
    /// terminally failed is `Pending`.
    pub fn from_stripe(s: &str) -> Self {
        match s {
            "succeeded" => PaymentStatus::Succeeded,
            "canceled" | "payment_failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Local mirror of a Stripe payment intent, keyed by the provider's ID.
///
/// `amount_cents` and `currency` are immutable once the row exists;
/// only `status`, `metadata` and a late user linkage may change.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub stripe_payment_intent_id: String,
    pub user_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub metadata: JsonValue,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
