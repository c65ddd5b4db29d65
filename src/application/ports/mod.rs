pub mod payment_provider;
pub mod record_store;
