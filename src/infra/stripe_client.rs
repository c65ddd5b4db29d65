use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::application::app_error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// List page size used for reconciliation sweeps. Stripe caps at 100.
pub const LIST_PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
}

impl StripeClient {
    pub fn new(secret_key: SecretString) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, secret_key }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Payment intents
    // ========================================================================

    pub async fn list_payment_intents(
        &self,
        created_after: i64,
        starting_after: Option<&str>,
    ) -> AppResult<StripeList<StripePaymentIntent>> {
        let mut query: Vec<(&str, String)> = vec![
            ("limit", LIST_PAGE_LIMIT.to_string()),
            ("created[gte]", created_after.to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/payment_intents", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn list_subscriptions(
        &self,
        starting_after: Option<&str>,
    ) -> AppResult<StripeList<StripeSubscription>> {
        // status=all so canceled subscriptions are still compared.
        let mut query: Vec<(&str, String)> = vec![
            ("limit", LIST_PAGE_LIMIT.to_string()),
            ("status", "all".to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/subscriptions", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");

            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(AppError::Provider(format!(
                    "Stripe error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }

            return Err(AppError::Provider(format!(
                "Stripe API error: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::Provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentError {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub items: Option<StripeSubscriptionItems>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeSubscription {
    /// First line item's price ID, when present.
    pub fn price_id(&self) -> Option<&str> {
        self.items
            .as_ref()?
            .data
            .first()?
            .price
            .as_ref()
            .map(|p| p.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub price: Option<StripePriceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePriceRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub attempt_count: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Inbound webhook event envelope. `data.object` stays untyped until a
/// handler asks for its concrete shape.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeWebhookData,
    #[serde(default)]
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeWebhookData {
    pub object: JsonValue,
}

impl StripeWebhookEvent {
    pub fn payment_intent(&self) -> AppResult<StripePaymentIntent> {
        self.object_as("payment intent")
    }

    pub fn subscription(&self) -> AppResult<StripeSubscription> {
        self.object_as("subscription")
    }

    pub fn invoice(&self) -> AppResult<StripeInvoice> {
        self.object_as("invoice")
    }

    pub fn checkout_session(&self) -> AppResult<StripeCheckoutSession> {
        self.object_as("checkout session")
    }

    fn object_as<T: for<'de> Deserialize<'de>>(&self, what: &str) -> AppResult<T> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            AppError::InvalidInput(format!("Malformed {} in event {}: {}", what, self.id, e))
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: Option<String>,
}
