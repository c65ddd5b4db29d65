use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use uuid::Uuid;

use crate::application::app_error::AppResult;
use crate::application::ports::record_store::{
    AuditLogRepoTrait, InvoiceRepoTrait, InvoiceUpsert, PaymentRepoTrait, PaymentUpsert,
    SubscriptionRepoTrait, SubscriptionUpsert,
};
use crate::domain::entities::invoice::InvoiceStatus;
use crate::domain::entities::payment::PaymentStatus;
use crate::domain::entities::subscription::SubscriptionStatus;
use crate::infra::stripe_client::{StripeSubscription, StripeWebhookEvent};
use crate::infra::webhook_signature::verify_webhook_signature;

/// Outcome of checking an inbound request's signature.
#[derive(Debug)]
pub enum WebhookVerification {
    /// Signature present and valid.
    Verified(StripeWebhookEvent),
    /// No webhook secret configured; accepted without verification.
    Unverified(StripeWebhookEvent),
    /// Rejected. The HTTP layer turns this into a 400.
    Invalid { reason: String },
}

/// What happened to a single event. Handler failures are captured here
/// rather than propagated so the provider still gets its 200 and does
/// not re-deliver a payload that will fail the same way again.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub event_type: String,
    pub handled: bool,
    pub record_id: Option<Uuid>,
    pub error: Option<String>,
}

pub struct StripeWebhookUseCases {
    payment_repo: Arc<dyn PaymentRepoTrait>,
    subscription_repo: Arc<dyn SubscriptionRepoTrait>,
    invoice_repo: Arc<dyn InvoiceRepoTrait>,
    audit_log: Arc<dyn AuditLogRepoTrait>,
    webhook_secret: Option<SecretString>,
}

impl StripeWebhookUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepoTrait>,
        subscription_repo: Arc<dyn SubscriptionRepoTrait>,
        invoice_repo: Arc<dyn InvoiceRepoTrait>,
        audit_log: Arc<dyn AuditLogRepoTrait>,
        webhook_secret: Option<SecretString>,
    ) -> Self {
        Self {
            payment_repo,
            subscription_repo,
            invoice_repo,
            audit_log,
            webhook_secret,
        }
    }

    /// Check the signature and parse the envelope.
    ///
    /// With no secret configured the event is accepted unverified; this
    /// keeps local and staging environments working but is logged loudly.
    pub fn verify_event(&self, raw_body: &str, signature_header: Option<&str>) -> WebhookVerification {
        match &self.webhook_secret {
            Some(secret) => {
                let Some(header) = signature_header else {
                    return WebhookVerification::Invalid {
                        reason: "missing signature header".into(),
                    };
                };
                let now = Utc::now().timestamp();
                if let Err(e) =
                    verify_webhook_signature(raw_body, header, secret.expose_secret(), now)
                {
                    return WebhookVerification::Invalid {
                        reason: e.to_string(),
                    };
                }
                match serde_json::from_str(raw_body) {
                    Ok(event) => WebhookVerification::Verified(event),
                    Err(e) => WebhookVerification::Invalid {
                        reason: format!("malformed event payload: {}", e),
                    },
                }
            }
            None => {
                tracing::warn!("no webhook secret configured, accepting event unverified");
                match serde_json::from_str(raw_body) {
                    Ok(event) => WebhookVerification::Unverified(event),
                    Err(e) => WebhookVerification::Invalid {
                        reason: format!("malformed event payload: {}", e),
                    },
                }
            }
        }
    }

    /// Route an event to its handler. Unknown types are acknowledged
    /// without touching any record.
    pub async fn dispatch(&self, event: &StripeWebhookEvent) -> DispatchOutcome {
        let result = match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                self.handle_payment_intent(event, PaymentStatus::Succeeded)
                    .await
            }
            "payment_intent.payment_failed" => {
                self.handle_payment_intent(event, PaymentStatus::Failed).await
            }
            "customer.subscription.created" => self.handle_subscription_change(event, false).await,
            "customer.subscription.updated" => self.handle_subscription_change(event, false).await,
            "customer.subscription.deleted" => self.handle_subscription_change(event, true).await,
            // "invoice.paid" is the newer alias Stripe sends for the
            // same transition.
            "invoice.payment_succeeded" | "invoice.paid" => {
                self.handle_invoice(event, InvoiceStatus::Paid).await
            }
            "invoice.payment_failed" => self.handle_invoice(event, InvoiceStatus::Failed).await,
            "checkout.session.completed" => self.handle_checkout_completed(event).await,
            other => {
                tracing::debug!(event_type = %other, event_id = %event.id, "unhandled webhook event type");
                return DispatchOutcome {
                    event_type: event.event_type.clone(),
                    handled: false,
                    record_id: None,
                    error: None,
                };
            }
        };

        match result {
            Ok(record_id) => DispatchOutcome {
                event_type: event.event_type.clone(),
                handled: true,
                record_id,
                error: None,
            },
            Err(e) => {
                tracing::error!(
                    event_type = %event.event_type,
                    event_id = %event.id,
                    error = %e,
                    "webhook handler failed"
                );
                DispatchOutcome {
                    event_type: event.event_type.clone(),
                    handled: true,
                    record_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn handle_payment_intent(
        &self,
        event: &StripeWebhookEvent,
        status: PaymentStatus,
    ) -> AppResult<Option<Uuid>> {
        let pi = event.payment_intent()?;
        let user_id = user_id_from_metadata(&pi.metadata);

        let record = self
            .payment_repo
            .upsert(&PaymentUpsert {
                stripe_payment_intent_id: pi.id.clone(),
                user_id,
                amount_cents: pi.amount,
                currency: pi.currency.clone(),
                status,
                metadata: json!(pi.metadata),
            })
            .await?;

        let mut payload = json!({
            "paymentIntentId": pi.id,
            "amount": pi.amount,
            "currency": pi.currency,
            "status": status.as_str(),
        });
        if let Some(error) = pi.last_payment_error.as_ref().and_then(|e| e.message.clone()) {
            payload["error"] = json!(error);
        }
        self.audit_log.append(&event.event_type, payload).await?;

        tracing::info!(
            payment_intent = %pi.id,
            status = status.as_str(),
            "payment intent recorded"
        );
        Ok(Some(record.id))
    }

    async fn handle_subscription_change(
        &self,
        event: &StripeWebhookEvent,
        deleted: bool,
    ) -> AppResult<Option<Uuid>> {
        let sub = event.subscription()?;
        let upsert = subscription_upsert(&sub, deleted);

        let record = self.subscription_repo.upsert(&upsert).await?;

        self.audit_log
            .append(
                &event.event_type,
                json!({
                    "subscriptionId": sub.id,
                    "customerId": sub.customer,
                    "status": upsert.status.as_str(),
                }),
            )
            .await?;

        tracing::info!(
            subscription = %sub.id,
            status = upsert.status.as_str(),
            "subscription recorded"
        );
        Ok(Some(record.id))
    }

    async fn handle_invoice(
        &self,
        event: &StripeWebhookEvent,
        status: InvoiceStatus,
    ) -> AppResult<Option<Uuid>> {
        let invoice = event.invoice()?;

        // Link to the local subscription when we already know it. The
        // linked subscription's user wins over metadata.userId.
        let mut subscription_id = None;
        let mut linked_user = None;
        if let Some(sub_ext_id) = &invoice.subscription {
            if let Some(local) = self
                .subscription_repo
                .get_by_subscription_id(sub_ext_id)
                .await?
            {
                subscription_id = Some(local.id);
                linked_user = local.user_id;
            }
        }
        let user_id = linked_user.or_else(|| user_id_from_metadata(&invoice.metadata));

        let record = self
            .invoice_repo
            .upsert(&InvoiceUpsert {
                stripe_invoice_id: invoice.id.clone(),
                user_id,
                subscription_id,
                amount_due_cents: invoice.amount_due,
                amount_paid_cents: invoice.amount_paid,
                currency: invoice.currency.clone().unwrap_or_else(|| "usd".into()),
                status,
                attempt_count: invoice.attempt_count,
                metadata: json!(invoice.metadata),
            })
            .await?;

        self.audit_log
            .append(
                &event.event_type,
                json!({
                    "invoiceId": invoice.id,
                    "subscriptionId": invoice.subscription,
                    "amountDue": invoice.amount_due,
                    "amountPaid": invoice.amount_paid,
                    "attemptCount": invoice.attempt_count,
                }),
            )
            .await?;

        tracing::info!(invoice = %invoice.id, status = status.as_str(), "invoice recorded");
        Ok(Some(record.id))
    }

    /// Checkout completion is recorded for the audit trail only; the
    /// subscription and payment events that follow carry the state.
    async fn handle_checkout_completed(&self, event: &StripeWebhookEvent) -> AppResult<Option<Uuid>> {
        let session = event.checkout_session()?;
        self.audit_log
            .append(
                &event.event_type,
                json!({
                    "sessionId": session.id,
                    "customerId": session.customer,
                    "subscriptionId": session.subscription,
                    "amountTotal": session.amount_total,
                }),
            )
            .await?;
        tracing::info!(session = %session.id, "checkout session completed");
        Ok(None)
    }
}

fn subscription_upsert(sub: &StripeSubscription, deleted: bool) -> SubscriptionUpsert {
    let status = if deleted {
        SubscriptionStatus::Canceled
    } else {
        SubscriptionStatus::from_stripe(&sub.status)
    };
    let canceled_at = if deleted {
        sub.canceled_at
            .and_then(timestamp_to_naive)
            .or_else(|| Some(Utc::now().naive_utc()))
    } else {
        sub.canceled_at.and_then(timestamp_to_naive)
    };

    SubscriptionUpsert {
        stripe_subscription_id: sub.id.clone(),
        stripe_customer_id: sub.customer.clone(),
        user_id: user_id_from_metadata(&sub.metadata),
        status,
        price_id: sub.price_id().map(str::to_owned),
        current_period_start: sub.current_period_start.and_then(timestamp_to_naive),
        current_period_end: sub.current_period_end.and_then(timestamp_to_naive),
        cancel_at_period_end: sub.cancel_at_period_end,
        canceled_at,
        metadata: json!(sub.metadata),
    }
}

fn user_id_from_metadata(metadata: &HashMap<String, String>) -> Option<Uuid> {
    metadata.get("userId").and_then(|v| Uuid::parse_str(v).ok())
}

fn timestamp_to_naive(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}
