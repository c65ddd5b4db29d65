pub mod reconciliation;
pub mod stripe_webhook;
