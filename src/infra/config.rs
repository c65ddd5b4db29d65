use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub database_url: String,
    pub db_max_connections: u32,
    pub stripe_secret_key: SecretString,
    /// Optional. When unset, inbound webhooks are accepted unverified
    /// (dev/staging convenience) and a warning is logged per event.
    pub stripe_webhook_secret: Option<SecretString>,
    /// How far back the payments reconciliation sweep looks.
    pub reconciliation_window_days: i64,
    pub delivery_base_delay_ms: u64,
    pub delivery_max_retries: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        let database_url: String = get_env("DATABASE_URL");
        let db_max_connections: u32 = get_env_default("DATABASE_MAX_CONNECTIONS", 5);

        let stripe_secret_key: SecretString =
            SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret: Option<SecretString> = std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into()));

        let reconciliation_window_days: i64 = get_env_default("RECONCILIATION_WINDOW_DAYS", 30);
        let delivery_base_delay_ms: u64 = get_env_default("WEBHOOK_DELIVERY_BASE_DELAY_MS", 1000);
        let delivery_max_retries: u32 = get_env_default("WEBHOOK_DELIVERY_MAX_RETRIES", 5);

        Self {
            bind_addr,
            cors_origin,
            database_url,
            db_max_connections,
            stripe_secret_key,
            stripe_webhook_secret,
            reconciliation_window_days,
            delivery_base_delay_ms,
            delivery_max_retries,
        }
    }
}
