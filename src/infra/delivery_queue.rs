use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::application::app_error::{AppError, AppResult};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// An outbound webhook waiting for delivery to a partner endpoint.
#[derive(Debug, Clone)]
pub struct OutboundWebhook {
    pub url: String,
    pub payload: JsonValue,
    pub headers: HashMap<String, String>,
}

#[derive(Debug)]
struct QueuedDelivery {
    webhook: OutboundWebhook,
    attempts: u32,
    next_attempt_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: bool,
}

#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, webhook: &OutboundWebhook) -> AppResult<()>;
}

/// Delivers webhooks over HTTP POST with a JSON body.
pub struct HttpDeliveryTransport {
    client: reqwest::Client,
}

impl HttpDeliveryTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpDeliveryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryTransport for HttpDeliveryTransport {
    async fn deliver(&self, webhook: &OutboundWebhook) -> AppResult<()> {
        let mut request = self.client.post(&webhook.url).json(&webhook.payload);
        for (name, value) in &webhook.headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("webhook delivery failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "webhook endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// In-process outbound delivery queue.
///
/// Deliveries run strictly in FIFO order on a single worker task; a
/// failing delivery is retried with exponential backoff while everything
/// behind it waits. Head-of-line blocking is accepted: ordering matters
/// more than throughput at current volume. After `max_retries` failed
/// attempts the webhook is dropped with an error log.
pub struct DeliveryQueue {
    inner: Mutex<VecDeque<QueuedDelivery>>,
    notify: Notify,
    processing: AtomicBool,
    transport: Arc<dyn DeliveryTransport>,
    base_delay: Duration,
    max_retries: u32,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn DeliveryTransport>, base_delay: Duration, max_retries: u32) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            processing: AtomicBool::new(false),
            transport,
            base_delay,
            max_retries,
        }
    }

    pub fn enqueue(&self, webhook: OutboundWebhook) {
        {
            let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            queue.push_back(QueuedDelivery {
                webhook,
                attempts: 0,
                next_attempt_at: Instant::now(),
            });
        }
        self.notify.notify_one();
    }

    pub fn status(&self) -> QueueStatus {
        let queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        QueueStatus {
            pending: queue.len(),
            processing: self.processing.load(Ordering::SeqCst),
        }
    }

    /// Worker loop. Run exactly one of these per queue instance.
    pub async fn run(self: Arc<Self>) {
        loop {
            let head_due_at = {
                let queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                queue.front().map(|d| d.next_attempt_at)
            };
            match head_due_at {
                None => self.notify.notified().await,
                Some(at) => {
                    tokio::time::sleep_until(at).await;
                    self.attempt_head().await;
                }
            }
        }
    }

    async fn attempt_head(&self) {
        let Some(mut delivery) = ({
            let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            queue.pop_front()
        }) else {
            return;
        };

        self.processing.store(true, Ordering::SeqCst);
        delivery.attempts += 1;
        let result = self.transport.deliver(&delivery.webhook).await;
        self.processing.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                tracing::info!(
                    url = %delivery.webhook.url,
                    attempts = delivery.attempts,
                    "webhook delivered"
                );
            }
            Err(e) if delivery.attempts >= self.max_retries => {
                tracing::error!(
                    url = %delivery.webhook.url,
                    attempts = delivery.attempts,
                    error = %e,
                    "webhook dropped after max retries"
                );
            }
            Err(e) => {
                let delay = backoff_delay(self.base_delay, delivery.attempts);
                tracing::warn!(
                    url = %delivery.webhook.url,
                    attempts = delivery.attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "webhook delivery failed, will retry"
                );
                delivery.next_attempt_at = Instant::now() + delay;
                let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                // Back to the head so ordering is preserved.
                queue.push_front(delivery);
            }
        }
    }
}

/// Delay before retry number `attempts + 1`: base * 2^(attempts - 1).
pub fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    base * 2u32.saturating_pow(attempts.saturating_sub(1))
}
