use async_trait::async_trait;

use crate::application::app_error::AppResult;
use crate::application::ports::payment_provider::{
    PaymentProviderPort, RemotePage, RemotePaymentIntent, RemoteSubscription,
};
use crate::infra::stripe_client::{StripeClient, StripePaymentIntent, StripeSubscription};

/// Adapts the raw Stripe API client to the provider port the
/// reconciliation engine consumes.
#[derive(Clone)]
pub struct StripeProviderAdapter {
    client: StripeClient,
}

impl StripeProviderAdapter {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentProviderPort for StripeProviderAdapter {
    async fn list_payment_intents(
        &self,
        created_after: i64,
        starting_after: Option<&str>,
    ) -> AppResult<RemotePage<RemotePaymentIntent>> {
        let page = self
            .client
            .list_payment_intents(created_after, starting_after)
            .await?;
        Ok(RemotePage {
            items: page.data.into_iter().map(remote_payment_intent).collect(),
            has_more: page.has_more,
        })
    }

    async fn list_subscriptions(
        &self,
        starting_after: Option<&str>,
    ) -> AppResult<RemotePage<RemoteSubscription>> {
        let page = self.client.list_subscriptions(starting_after).await?;
        Ok(RemotePage {
            items: page.data.into_iter().map(remote_subscription).collect(),
            has_more: page.has_more,
        })
    }
}

fn remote_payment_intent(pi: StripePaymentIntent) -> RemotePaymentIntent {
    RemotePaymentIntent {
        metadata: serde_json::json!(pi.metadata),
        id: pi.id,
        amount: pi.amount,
        currency: pi.currency,
        status: pi.status,
    }
}

fn remote_subscription(sub: StripeSubscription) -> RemoteSubscription {
    RemoteSubscription {
        price_id: sub.price_id().map(str::to_owned),
        metadata: serde_json::json!(sub.metadata),
        id: sub.id,
        customer: sub.customer,
        status: sub.status,
        current_period_start: sub.current_period_start,
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
        canceled_at: sub.canceled_at,
    }
}
