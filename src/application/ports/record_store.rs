use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::application::app_error::AppResult;
use crate::domain::entities::audit_event::AuditEvent;
use crate::domain::entities::invoice::{InvoiceRecord, InvoiceStatus};
use crate::domain::entities::payment::{PaymentRecord, PaymentStatus};
use crate::domain::entities::subscription::{SubscriptionRecord, SubscriptionStatus};

/// Write model for a payment upsert.
///
/// Amount and currency only apply on insert; an existing row keeps its
/// original values.
#[derive(Debug, Clone)]
pub struct PaymentUpsert {
    pub stripe_payment_intent_id: String,
    pub user_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub user_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    pub current_period_start: Option<NaiveDateTime>,
    pub current_period_end: Option<NaiveDateTime>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<NaiveDateTime>,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone)]
pub struct InvoiceUpsert {
    pub stripe_invoice_id: String,
    pub user_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub amount_due_cents: i64,
    pub amount_paid_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub attempt_count: i32,
    pub metadata: JsonValue,
}

#[async_trait]
pub trait PaymentRepoTrait: Send + Sync {
    async fn upsert(&self, payment: &PaymentUpsert) -> AppResult<PaymentRecord>;
    async fn get_by_intent_id(&self, intent_id: &str) -> AppResult<Option<PaymentRecord>>;
    async fn update_status(&self, intent_id: &str, status: PaymentStatus) -> AppResult<()>;
}

#[async_trait]
pub trait SubscriptionRepoTrait: Send + Sync {
    async fn upsert(&self, subscription: &SubscriptionUpsert) -> AppResult<SubscriptionRecord>;
    async fn get_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<SubscriptionRecord>>;
    async fn update_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
        cancel_at_period_end: bool,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait InvoiceRepoTrait: Send + Sync {
    async fn upsert(&self, invoice: &InvoiceUpsert) -> AppResult<InvoiceRecord>;
    async fn get_by_invoice_id(&self, invoice_id: &str) -> AppResult<Option<InvoiceRecord>>;
}

#[async_trait]
pub trait AuditLogRepoTrait: Send + Sync {
    /// Append a new entry. The log is append-only; there is no update or
    /// delete operation on this trait by design of the schema.
    async fn append(&self, event_type: &str, payload: JsonValue) -> AppResult<AuditEvent>;

    /// Count entries per event type recorded at or after `since`.
    /// Types with no entries are absent from the returned map.
    async fn count_by_type_since(
        &self,
        event_types: &[&str],
        since: NaiveDateTime,
    ) -> AppResult<HashMap<String, i64>>;
}
