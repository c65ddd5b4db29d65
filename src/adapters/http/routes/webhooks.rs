use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde_json::json;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::stripe_webhook::WebhookVerification,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/stripe", post(stripe_webhook))
}

/// Inbound Stripe events. Always acks with 200 once the signature is
/// good; only a bad signature or unparseable body gets a 400, which
/// makes Stripe re-deliver.
async fn stripe_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let signature_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let event = match app_state
        .stripe_webhooks
        .verify_event(&body, signature_header)
    {
        WebhookVerification::Verified(event) => event,
        WebhookVerification::Unverified(event) => event,
        WebhookVerification::Invalid { reason } => {
            tracing::warn!(reason = %reason, "rejected webhook");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid webhook", "message": reason})),
            );
        }
    };

    let outcome = app_state.stripe_webhooks.dispatch(&event).await;

    let mut response = json!({
        "received": true,
        "type": outcome.event_type,
        "handled": outcome.handled,
    });
    if let Some(error) = outcome.error {
        response["error"] = json!(error);
    }
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum_test::TestServer;
    use secrecy::SecretString;

    use super::*;
    use crate::application::use_cases::reconciliation::ReconciliationUseCases;
    use crate::application::use_cases::stripe_webhook::StripeWebhookUseCases;
    use crate::infra::config::AppConfig;
    use crate::infra::delivery_queue::{DeliveryQueue, HttpDeliveryTransport};
    use crate::infra::webhook_signature::sign_webhook_payload;
    use crate::test_utils::factories::payment_intent_event;
    use crate::test_utils::provider_mocks::MockProvider;
    use crate::test_utils::store_mocks::{
        InMemoryAuditLog, InMemoryInvoiceRepo, InMemoryPaymentRepo, InMemorySubscriptionRepo,
    };

    fn test_config() -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            cors_origin: "http://localhost:3000".parse().unwrap(),
            database_url: "postgres://unused".into(),
            db_max_connections: 5,
            stripe_secret_key: SecretString::from("sk_test".to_string()),
            stripe_webhook_secret: None,
            reconciliation_window_days: 30,
            delivery_base_delay_ms: 1000,
            delivery_max_retries: 5,
        }
    }

    fn test_server(webhook_secret: Option<&str>) -> (TestServer, Arc<InMemoryPaymentRepo>) {
        let payments = Arc::new(InMemoryPaymentRepo::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepo::new());
        let audit = Arc::new(InMemoryAuditLog::new());

        let stripe_webhooks = StripeWebhookUseCases::new(
            payments.clone(),
            subscriptions.clone(),
            Arc::new(InMemoryInvoiceRepo::new()),
            audit.clone(),
            webhook_secret.map(|s| SecretString::from(s.to_string())),
        );
        let reconciliation = ReconciliationUseCases::new(
            Arc::new(MockProvider::new()),
            payments.clone(),
            subscriptions,
            audit,
            30,
        );
        let state = AppState {
            config: Arc::new(test_config()),
            stripe_webhooks: Arc::new(stripe_webhooks),
            reconciliation: Arc::new(reconciliation),
            delivery_queue: Arc::new(DeliveryQueue::new(
                Arc::new(HttpDeliveryTransport::new()),
                Duration::from_millis(1000),
                5,
            )),
        };
        let app = Router::new()
            .nest("/api/webhooks", router())
            .with_state(state);
        (TestServer::new(app).unwrap(), payments)
    }

    #[tokio::test]
    async fn acks_unverified_event_without_secret() {
        let (server, payments) = test_server(None);
        let body =
            payment_intent_event("payment_intent.succeeded", "pi_1", 14900, "succeeded", None);

        let response = server.post("/api/webhooks/stripe").json(&body).await;
        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["received"], true);
        assert_eq!(json["handled"], true);
        assert_eq!(payments.len(), 1);
    }

    #[tokio::test]
    async fn accepts_signed_event() {
        let (server, payments) = test_server(Some("whsec_test"));
        let body =
            payment_intent_event("payment_intent.succeeded", "pi_2", 5000, "succeeded", None)
                .to_string();
        let header = sign_webhook_payload("whsec_test", chrono::Utc::now().timestamp(), &body);

        let response = server
            .post("/api/webhooks/stripe")
            .add_header("stripe-signature", header)
            .add_header("content-type", "application/json")
            .text(body)
            .await;
        response.assert_status_ok();
        assert_eq!(payments.len(), 1);
    }

    #[tokio::test]
    async fn rejects_missing_signature_with_400() {
        let (server, payments) = test_server(Some("whsec_test"));
        let body =
            payment_intent_event("payment_intent.succeeded", "pi_3", 5000, "succeeded", None);

        let response = server.post("/api/webhooks/stripe").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(payments.len(), 0);
    }

    #[tokio::test]
    async fn rejects_bad_signature_with_400() {
        let (server, payments) = test_server(Some("whsec_test"));
        let body =
            payment_intent_event("payment_intent.succeeded", "pi_4", 5000, "succeeded", None)
                .to_string();
        let header = sign_webhook_payload("whsec_wrong", chrono::Utc::now().timestamp(), &body);

        let response = server
            .post("/api/webhooks/stripe")
            .add_header("stripe-signature", header)
            .add_header("content-type", "application/json")
            .text(body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(payments.len(), 0);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acked_unhandled() {
        let (server, _) = test_server(None);
        let body = serde_json::json!({
            "id": "evt_x",
            "type": "customer.created",
            "data": {"object": {"id": "cus_1"}}
        });

        let response = server.post("/api/webhooks/stripe").json(&body).await;
        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["handled"], false);
    }
}
