use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::record_store::{
    AuditLogRepoTrait, InvoiceRepoTrait, InvoiceUpsert, PaymentRepoTrait, PaymentUpsert,
    SubscriptionRepoTrait, SubscriptionUpsert,
};
use crate::domain::entities::audit_event::AuditEvent;
use crate::domain::entities::invoice::InvoiceRecord;
use crate::domain::entities::payment::{PaymentRecord, PaymentStatus};
use crate::domain::entities::subscription::{SubscriptionRecord, SubscriptionStatus};

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ============================================================================
// Payments
// ============================================================================

pub struct InMemoryPaymentRepo {
    records: Mutex<HashMap<String, PaymentRecord>>,
    fail_next: AtomicBool,
}

impl InMemoryPaymentRepo {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Make the next store call fail with a database error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn seed(&self, intent_id: &str, amount_cents: i64, currency: &str, status: PaymentStatus) {
        let mut records = self.records.lock().unwrap();
        records.insert(
            intent_id.to_string(),
            PaymentRecord {
                id: Uuid::new_v4(),
                stripe_payment_intent_id: intent_id.to_string(),
                user_id: None,
                amount_cents,
                currency: currency.to_string(),
                status,
                metadata: json!({}),
                created_at: Some(now()),
                updated_at: Some(now()),
            },
        );
    }

    fn check_failure(&self) -> AppResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentRepoTrait for InMemoryPaymentRepo {
    async fn upsert(&self, payment: &PaymentUpsert) -> AppResult<PaymentRecord> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(payment.stripe_payment_intent_id.clone())
            .and_modify(|existing| {
                existing.status = payment.status;
                existing.metadata = payment.metadata.clone();
                existing.user_id = existing.user_id.or(payment.user_id);
                existing.updated_at = Some(now());
            })
            .or_insert_with(|| PaymentRecord {
                id: Uuid::new_v4(),
                stripe_payment_intent_id: payment.stripe_payment_intent_id.clone(),
                user_id: payment.user_id,
                amount_cents: payment.amount_cents,
                currency: payment.currency.clone(),
                status: payment.status,
                metadata: payment.metadata.clone(),
                created_at: Some(now()),
                updated_at: Some(now()),
            });
        Ok(record.clone())
    }

    async fn get_by_intent_id(&self, intent_id: &str) -> AppResult<Option<PaymentRecord>> {
        self.check_failure()?;
        Ok(self.records.lock().unwrap().get(intent_id).cloned())
    }

    async fn update_status(&self, intent_id: &str, status: PaymentStatus) -> AppResult<()> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(intent_id).ok_or(AppError::NotFound)?;
        record.status = status;
        record.updated_at = Some(now());
        Ok(())
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

pub struct InMemorySubscriptionRepo {
    records: Mutex<HashMap<String, SubscriptionRecord>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn seed(&self, subscription_id: &str, customer_id: &str, status: SubscriptionStatus) {
        let mut records = self.records.lock().unwrap();
        records.insert(
            subscription_id.to_string(),
            SubscriptionRecord {
                id: Uuid::new_v4(),
                stripe_subscription_id: subscription_id.to_string(),
                stripe_customer_id: customer_id.to_string(),
                user_id: None,
                status,
                price_id: None,
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: false,
                canceled_at: None,
                metadata: json!({}),
                created_at: Some(now()),
                updated_at: Some(now()),
            },
        );
    }
}

#[async_trait]
impl SubscriptionRepoTrait for InMemorySubscriptionRepo {
    async fn upsert(&self, sub: &SubscriptionUpsert) -> AppResult<SubscriptionRecord> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(sub.stripe_subscription_id.clone())
            .and_modify(|existing| {
                existing.stripe_customer_id = sub.stripe_customer_id.clone();
                existing.status = sub.status;
                existing.price_id = sub.price_id.clone().or(existing.price_id.take());
                existing.current_period_start = sub.current_period_start;
                existing.current_period_end = sub.current_period_end;
                existing.cancel_at_period_end = sub.cancel_at_period_end;
                existing.canceled_at = sub.canceled_at;
                existing.metadata = sub.metadata.clone();
                existing.user_id = existing.user_id.or(sub.user_id);
                existing.updated_at = Some(now());
            })
            .or_insert_with(|| SubscriptionRecord {
                id: Uuid::new_v4(),
                stripe_subscription_id: sub.stripe_subscription_id.clone(),
                stripe_customer_id: sub.stripe_customer_id.clone(),
                user_id: sub.user_id,
                status: sub.status,
                price_id: sub.price_id.clone(),
                current_period_start: sub.current_period_start,
                current_period_end: sub.current_period_end,
                cancel_at_period_end: sub.cancel_at_period_end,
                canceled_at: sub.canceled_at,
                metadata: sub.metadata.clone(),
                created_at: Some(now()),
                updated_at: Some(now()),
            });
        Ok(record.clone())
    }

    async fn get_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<SubscriptionRecord>> {
        Ok(self.records.lock().unwrap().get(subscription_id).cloned())
    }

    async fn update_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
        cancel_at_period_end: bool,
    ) -> AppResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(subscription_id).ok_or(AppError::NotFound)?;
        record.status = status;
        record.cancel_at_period_end = cancel_at_period_end;
        record.updated_at = Some(now());
        Ok(())
    }
}

// ============================================================================
// Invoices
// ============================================================================

pub struct InMemoryInvoiceRepo {
    records: Mutex<HashMap<String, InvoiceRecord>>,
}

impl InMemoryInvoiceRepo {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl InvoiceRepoTrait for InMemoryInvoiceRepo {
    async fn upsert(&self, invoice: &InvoiceUpsert) -> AppResult<InvoiceRecord> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(invoice.stripe_invoice_id.clone())
            .and_modify(|existing| {
                existing.status = invoice.status;
                existing.amount_paid_cents = invoice.amount_paid_cents;
                existing.attempt_count = existing.attempt_count.max(invoice.attempt_count);
                existing.subscription_id = invoice.subscription_id.or(existing.subscription_id);
                existing.user_id = existing.user_id.or(invoice.user_id);
                existing.metadata = invoice.metadata.clone();
                existing.updated_at = Some(now());
            })
            .or_insert_with(|| InvoiceRecord {
                id: Uuid::new_v4(),
                stripe_invoice_id: invoice.stripe_invoice_id.clone(),
                user_id: invoice.user_id,
                subscription_id: invoice.subscription_id,
                amount_due_cents: invoice.amount_due_cents,
                amount_paid_cents: invoice.amount_paid_cents,
                currency: invoice.currency.clone(),
                status: invoice.status,
                attempt_count: invoice.attempt_count,
                metadata: invoice.metadata.clone(),
                created_at: Some(now()),
                updated_at: Some(now()),
            });
        Ok(record.clone())
    }

    async fn get_by_invoice_id(&self, invoice_id: &str) -> AppResult<Option<InvoiceRecord>> {
        Ok(self.records.lock().unwrap().get(invoice_id).cloned())
    }
}

// ============================================================================
// Audit log
// ============================================================================

pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<AuditEvent> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLogRepoTrait for InMemoryAuditLog {
    async fn append(&self, event_type: &str, payload: JsonValue) -> AppResult<AuditEvent> {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload,
            created_at: Some(now()),
        };
        self.entries.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn count_by_type_since(
        &self,
        event_types: &[&str],
        since: NaiveDateTime,
    ) -> AppResult<HashMap<String, i64>> {
        let entries = self.entries.lock().unwrap();
        let mut counts = HashMap::new();
        for entry in entries.iter() {
            let recent = entry.created_at.map(|at| at >= since).unwrap_or(false);
            if recent && event_types.contains(&entry.event_type.as_str()) {
                *counts.entry(entry.event_type.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}
