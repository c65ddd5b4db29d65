use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::payment_provider::{
    PaymentProviderPort, RemotePaymentIntent, RemoteSubscription,
};
use crate::application::ports::record_store::{
    AuditLogRepoTrait, PaymentRepoTrait, PaymentUpsert, SubscriptionRepoTrait, SubscriptionUpsert,
};
use crate::domain::entities::payment::PaymentStatus;
use crate::domain::entities::subscription::SubscriptionStatus;

/// How far back the payments sweep looks.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Audit event types that indicate inbound webhooks are flowing.
const HEALTH_KEY_EVENT_TYPES: [&str; 3] = [
    "payment_intent.succeeded",
    "customer.subscription.created",
    "invoice.payment_succeeded",
];

const HEALTH_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    StatusMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub record_id: String,
    pub local_status: String,
    pub remote_status: String,
    pub kind: DiscrepancyKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub started_at: chrono::DateTime<Utc>,
    pub duration_ms: i64,
    pub total: usize,
    pub synced: usize,
    pub created: usize,
    pub updated: usize,
    pub discrepancies: Vec<Discrepancy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookHealthStatus {
    Healthy,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookHealth {
    pub status: WebhookHealthStatus,
    pub window_hours: i64,
    pub total: i64,
    pub by_type: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReconciliationSummary {
    pub payments: ReconciliationReport,
    pub subscriptions: ReconciliationReport,
    pub webhook_health: WebhookHealth,
}

pub struct ReconciliationUseCases {
    provider: Arc<dyn PaymentProviderPort>,
    payment_repo: Arc<dyn PaymentRepoTrait>,
    subscription_repo: Arc<dyn SubscriptionRepoTrait>,
    audit_log: Arc<dyn AuditLogRepoTrait>,
    window: Duration,
}

impl ReconciliationUseCases {
    pub fn new(
        provider: Arc<dyn PaymentProviderPort>,
        payment_repo: Arc<dyn PaymentRepoTrait>,
        subscription_repo: Arc<dyn SubscriptionRepoTrait>,
        audit_log: Arc<dyn AuditLogRepoTrait>,
        window_days: i64,
    ) -> Self {
        Self {
            provider,
            payment_repo,
            subscription_repo,
            audit_log,
            window: Duration::days(window_days),
        }
    }

    /// Sweep the provider's payment intents within the window against
    /// local records. Missing records are created, status mismatches are
    /// corrected in the provider's favor.
    pub async fn reconcile_payments(&self) -> AppResult<ReconciliationReport> {
        match self.reconcile_payments_inner().await {
            Ok(report) => {
                self.record_report("payments", &report).await?;
                Ok(report)
            }
            Err(e) => {
                self.record_failure("payments", &e).await;
                Err(e)
            }
        }
    }

    async fn reconcile_payments_inner(&self) -> AppResult<ReconciliationReport> {
        let started_at = Utc::now();
        let created_after = (started_at - self.window).timestamp();

        // Accumulate the full remote set before diffing so a mid-sweep
        // page failure never produces a partial report.
        let mut remote: Vec<RemotePaymentIntent> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .provider
                .list_payment_intents(created_after, cursor.as_deref())
                .await?;
            remote.extend(page.items);
            if !page.has_more {
                break;
            }
            cursor = remote.last().map(|pi| pi.id.clone());
        }

        let mut report = ReconciliationReport {
            started_at,
            duration_ms: 0,
            total: remote.len(),
            synced: 0,
            created: 0,
            updated: 0,
            discrepancies: Vec::new(),
        };

        for pi in &remote {
            let remote_status = PaymentStatus::from_stripe(&pi.status);
            match self.payment_repo.get_by_intent_id(&pi.id).await? {
                None => {
                    self.payment_repo
                        .upsert(&PaymentUpsert {
                            stripe_payment_intent_id: pi.id.clone(),
                            user_id: user_id_from_metadata(&pi.metadata),
                            amount_cents: pi.amount,
                            currency: pi.currency.clone(),
                            status: remote_status,
                            metadata: pi.metadata.clone(),
                        })
                        .await?;
                    report.created += 1;
                }
                Some(local) if local.status != remote_status => {
                    self.payment_repo
                        .update_status(&pi.id, remote_status)
                        .await?;
                    report.discrepancies.push(Discrepancy {
                        record_id: pi.id.clone(),
                        local_status: local.status.as_str().into(),
                        remote_status: remote_status.as_str().into(),
                        kind: DiscrepancyKind::StatusMismatch,
                    });
                    report.updated += 1;
                }
                Some(_) => report.synced += 1,
            }
        }

        report.duration_ms = (Utc::now() - started_at).num_milliseconds();
        tracing::info!(
            total = report.total,
            synced = report.synced,
            created = report.created,
            updated = report.updated,
            "payments reconciliation complete"
        );
        Ok(report)
    }

    /// Sweep all provider subscriptions, regardless of status or age,
    /// so long-canceled subscriptions still converge.
    pub async fn reconcile_subscriptions(&self) -> AppResult<ReconciliationReport> {
        match self.reconcile_subscriptions_inner().await {
            Ok(report) => {
                self.record_report("subscriptions", &report).await?;
                Ok(report)
            }
            Err(e) => {
                self.record_failure("subscriptions", &e).await;
                Err(e)
            }
        }
    }

    async fn reconcile_subscriptions_inner(&self) -> AppResult<ReconciliationReport> {
        let started_at = Utc::now();

        let mut remote: Vec<RemoteSubscription> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .provider
                .list_subscriptions(cursor.as_deref())
                .await?;
            remote.extend(page.items);
            if !page.has_more {
                break;
            }
            cursor = remote.last().map(|s| s.id.clone());
        }

        let mut report = ReconciliationReport {
            started_at,
            duration_ms: 0,
            total: remote.len(),
            synced: 0,
            created: 0,
            updated: 0,
            discrepancies: Vec::new(),
        };

        for sub in &remote {
            let remote_status = SubscriptionStatus::from_stripe(&sub.status);
            match self
                .subscription_repo
                .get_by_subscription_id(&sub.id)
                .await?
            {
                None => {
                    self.subscription_repo
                        .upsert(&subscription_upsert(sub, remote_status))
                        .await?;
                    report.created += 1;
                }
                Some(local) if local.status != remote_status => {
                    self.subscription_repo
                        .update_status(&sub.id, remote_status, sub.cancel_at_period_end)
                        .await?;
                    report.discrepancies.push(Discrepancy {
                        record_id: sub.id.clone(),
                        local_status: local.status.as_str().into(),
                        remote_status: remote_status.as_str().into(),
                        kind: DiscrepancyKind::StatusMismatch,
                    });
                    report.updated += 1;
                }
                Some(_) => report.synced += 1,
            }
        }

        report.duration_ms = (Utc::now() - started_at).num_milliseconds();
        tracing::info!(
            total = report.total,
            synced = report.synced,
            created = report.created,
            updated = report.updated,
            "subscriptions reconciliation complete"
        );
        Ok(report)
    }

    /// Count recent key webhook events in the audit log. Zero activity
    /// over the window suggests the webhook endpoint is broken or the
    /// provider stopped sending.
    pub async fn check_webhook_health(&self) -> AppResult<WebhookHealth> {
        let since = (Utc::now() - Duration::hours(HEALTH_WINDOW_HOURS)).naive_utc();
        let by_type = self
            .audit_log
            .count_by_type_since(&HEALTH_KEY_EVENT_TYPES, since)
            .await?;
        let total: i64 = by_type.values().sum();
        let status = if total > 0 {
            WebhookHealthStatus::Healthy
        } else {
            tracing::warn!(
                window_hours = HEALTH_WINDOW_HOURS,
                "no key webhook events received in window"
            );
            WebhookHealthStatus::Warning
        };
        Ok(WebhookHealth {
            status,
            window_hours: HEALTH_WINDOW_HOURS,
            total,
            by_type,
        })
    }

    /// Full daily sweep: payments, then subscriptions, then webhook
    /// health, with one summary audit entry on top of the per-family ones.
    pub async fn run_daily_reconciliation(&self) -> AppResult<DailyReconciliationSummary> {
        let result = async {
            let payments = self.reconcile_payments().await?;
            let subscriptions = self.reconcile_subscriptions().await?;
            let webhook_health = self.check_webhook_health().await?;
            Ok(DailyReconciliationSummary {
                payments,
                subscriptions,
                webhook_health,
            })
        }
        .await;

        match result {
            Ok(summary) => {
                let payload = serde_json::to_value(&summary)
                    .map_err(|e| AppError::Internal(format!("summary serialization: {}", e)))?;
                self.audit_log
                    .append("reconciliation.daily.completed", payload)
                    .await?;
                Ok(summary)
            }
            Err(e) => {
                self.record_failure("daily", &e).await;
                Err(e)
            }
        }
    }

    async fn record_report(&self, family: &str, report: &ReconciliationReport) -> AppResult<()> {
        let payload = serde_json::to_value(report)
            .map_err(|e| AppError::Internal(format!("report serialization: {}", e)))?;
        self.audit_log
            .append(&format!("reconciliation.{}.completed", family), payload)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, family: &str, error: &AppError) {
        let event_type = format!("reconciliation.{}.failed", family);
        if let Err(audit_err) = self
            .audit_log
            .append(&event_type, json!({"error": error.to_string()}))
            .await
        {
            tracing::error!(
                family,
                error = %audit_err,
                "failed to record reconciliation failure"
            );
        }
    }
}

/// Same user resolution as the webhook path: a record healed by the
/// sweep should not lose the linkage a webhook would have carried.
fn user_id_from_metadata(metadata: &JsonValue) -> Option<Uuid> {
    metadata
        .get("userId")
        .and_then(|v| v.as_str())
        .and_then(|v| Uuid::parse_str(v).ok())
}

fn subscription_upsert(sub: &RemoteSubscription, status: SubscriptionStatus) -> SubscriptionUpsert {
    SubscriptionUpsert {
        stripe_subscription_id: sub.id.clone(),
        stripe_customer_id: sub.customer.clone(),
        user_id: user_id_from_metadata(&sub.metadata),
        status,
        price_id: sub.price_id.clone(),
        current_period_start: sub
            .current_period_start
            .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
            .map(|dt| dt.naive_utc()),
        current_period_end: sub
            .current_period_end
            .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
            .map(|dt| dt.naive_utc()),
        cancel_at_period_end: sub.cancel_at_period_end,
        canceled_at: sub
            .canceled_at
            .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
            .map(|dt| dt.naive_utc()),
        metadata: sub.metadata.clone(),
    }
}
