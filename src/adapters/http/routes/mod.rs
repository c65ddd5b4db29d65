pub mod health;
pub mod reconciliation;
pub mod webhooks;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/webhooks", webhooks::router())
        .nest("/admin", reconciliation::router())
        .nest("/health", health::router())
}
