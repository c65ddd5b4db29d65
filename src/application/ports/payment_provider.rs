use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::application::app_error::AppResult;

/// One page of a cursor-paginated provider listing.
#[derive(Debug, Clone)]
pub struct RemotePage<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct RemotePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone)]
pub struct RemoteSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<i64>,
    pub metadata: JsonValue,
}

/// Read-side access to the payment provider's records, used by the
/// reconciliation engine. Pages are fetched with the provider's
/// `starting_after` cursor; callers pass the last ID of the previous page.
#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    async fn list_payment_intents(
        &self,
        created_after: i64,
        starting_after: Option<&str>,
    ) -> AppResult<RemotePage<RemotePaymentIntent>>;

    async fn list_subscriptions(
        &self,
        starting_after: Option<&str>,
    ) -> AppResult<RemotePage<RemoteSubscription>>;
}
