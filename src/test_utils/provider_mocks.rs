use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::payment_provider::{
    PaymentProviderPort, RemotePage, RemotePaymentIntent, RemoteSubscription,
};

/// Scripted provider for reconciliation tests. Pages are served in
/// order; the cursor passed for each fetch is recorded for assertions.
pub struct MockProvider {
    payment_pages: Mutex<Vec<Vec<RemotePaymentIntent>>>,
    subscription_pages: Mutex<Vec<Vec<RemoteSubscription>>>,
    payment_cursor_log: Mutex<Vec<Option<String>>>,
    payment_page_index: Mutex<usize>,
    subscription_page_index: Mutex<usize>,
    payment_failure: Mutex<Option<String>>,
    subscription_failure: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            payment_pages: Mutex::new(Vec::new()),
            subscription_pages: Mutex::new(Vec::new()),
            payment_cursor_log: Mutex::new(Vec::new()),
            payment_page_index: Mutex::new(0),
            subscription_page_index: Mutex::new(0),
            payment_failure: Mutex::new(None),
            subscription_failure: Mutex::new(None),
        }
    }

    pub fn set_payment_pages(&self, pages: Vec<Vec<RemotePaymentIntent>>) {
        *self.payment_pages.lock().unwrap() = pages;
        *self.payment_page_index.lock().unwrap() = 0;
    }

    pub fn set_subscription_pages(&self, pages: Vec<Vec<RemoteSubscription>>) {
        *self.subscription_pages.lock().unwrap() = pages;
        *self.subscription_page_index.lock().unwrap() = 0;
    }

    pub fn fail_payments(&self, message: &str) {
        *self.payment_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_subscriptions(&self, message: &str) {
        *self.subscription_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn payment_cursors(&self) -> Vec<Option<String>> {
        self.payment_cursor_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProviderPort for MockProvider {
    async fn list_payment_intents(
        &self,
        _created_after: i64,
        starting_after: Option<&str>,
    ) -> AppResult<RemotePage<RemotePaymentIntent>> {
        self.payment_cursor_log
            .lock()
            .unwrap()
            .push(starting_after.map(str::to_owned));

        if let Some(message) = self.payment_failure.lock().unwrap().clone() {
            return Err(AppError::Provider(message));
        }

        let pages = self.payment_pages.lock().unwrap();
        let mut index = self.payment_page_index.lock().unwrap();
        let items = pages.get(*index).cloned().unwrap_or_default();
        *index += 1;
        Ok(RemotePage {
            has_more: *index < pages.len(),
            items,
        })
    }

    async fn list_subscriptions(
        &self,
        _starting_after: Option<&str>,
    ) -> AppResult<RemotePage<RemoteSubscription>> {
        if let Some(message) = self.subscription_failure.lock().unwrap().clone() {
            return Err(AppError::Provider(message));
        }

        let pages = self.subscription_pages.lock().unwrap();
        let mut index = self.subscription_page_index.lock().unwrap();
        let items = pages.get(*index).cloned().unwrap_or_default();
        *index += 1;
        Ok(RemotePage {
            has_more: *index < pages.len(),
            items,
        })
    }
}
