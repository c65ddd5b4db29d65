use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::{
        ports::{
            payment_provider::PaymentProviderPort,
            record_store::{
                AuditLogRepoTrait, InvoiceRepoTrait, PaymentRepoTrait, SubscriptionRepoTrait,
            },
        },
        use_cases::{reconciliation::ReconciliationUseCases, stripe_webhook::StripeWebhookUseCases},
    },
    infra::{
        config::AppConfig,
        db::init_db,
        delivery_queue::{DeliveryQueue, HttpDeliveryTransport},
        stripe_client::StripeClient,
        stripe_provider_adapter::StripeProviderAdapter,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url, config.db_max_connections).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let payment_repo = postgres_arc.clone() as Arc<dyn PaymentRepoTrait>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepoTrait>;
    let invoice_repo = postgres_arc.clone() as Arc<dyn InvoiceRepoTrait>;
    let audit_log = postgres_arc.clone() as Arc<dyn AuditLogRepoTrait>;

    let stripe_client = StripeClient::new(config.stripe_secret_key.clone());
    let provider = Arc::new(StripeProviderAdapter::new(stripe_client)) as Arc<dyn PaymentProviderPort>;

    let stripe_webhooks = StripeWebhookUseCases::new(
        payment_repo.clone(),
        subscription_repo.clone(),
        invoice_repo,
        audit_log.clone(),
        config.stripe_webhook_secret.clone(),
    );

    let reconciliation = ReconciliationUseCases::new(
        provider,
        payment_repo,
        subscription_repo,
        audit_log,
        config.reconciliation_window_days,
    );

    let delivery_queue = Arc::new(DeliveryQueue::new(
        Arc::new(HttpDeliveryTransport::new()),
        Duration::from_millis(config.delivery_base_delay_ms),
        config.delivery_max_retries,
    ));

    Ok(AppState {
        config: Arc::new(config),
        stripe_webhooks: Arc::new(stripe_webhooks),
        reconciliation: Arc::new(reconciliation),
        delivery_queue,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "freight_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
