use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{adapters::http::app_state::AppState, application::app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reconciliation/run", post(run_reconciliation))
        .route("/webhooks/health", get(webhook_health))
        .route("/webhooks/queue", get(queue_status))
}

/// Kick off the full daily sweep on demand. Runs inline; the caller
/// waits for the summary.
async fn run_reconciliation(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let summary = app_state.reconciliation.run_daily_reconciliation().await?;
    Ok(Json(summary))
}

async fn webhook_health(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let health = app_state.reconciliation.check_webhook_health().await?;
    Ok(Json(health))
}

async fn queue_status(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.delivery_queue.status())
}
