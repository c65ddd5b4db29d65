use std::sync::Arc;

use crate::{
    application::use_cases::{
        reconciliation::ReconciliationUseCases, stripe_webhook::StripeWebhookUseCases,
    },
    infra::{config::AppConfig, delivery_queue::DeliveryQueue},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stripe_webhooks: Arc<StripeWebhookUseCases>,
    pub reconciliation: Arc<ReconciliationUseCases>,
    pub delivery_queue: Arc<DeliveryQueue>,
}
