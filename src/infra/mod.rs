pub mod app;
pub mod config;
pub mod db;
pub mod delivery_queue;
pub mod setup;
pub mod stripe_client;
pub mod stripe_provider_adapter;
pub mod webhook_signature;
