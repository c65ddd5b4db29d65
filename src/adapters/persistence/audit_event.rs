use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::PostgresPersistence;
use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::record_store::AuditLogRepoTrait;
use crate::domain::entities::audit_event::AuditEvent;

#[async_trait]
impl AuditLogRepoTrait for PostgresPersistence {
    async fn append(&self, event_type: &str, payload: JsonValue) -> AppResult<AuditEvent> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO audit_events (id, event_type, payload)
            VALUES ($1, $2, $3)
            RETURNING id, event_type, payload, created_at
            "#,
        )
        .bind(id)
        .bind(event_type)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(AuditEvent {
            id: row.get("id"),
            event_type: row.get("event_type"),
            payload: row.get("payload"),
            created_at: row.get("created_at"),
        })
    }

    async fn count_by_type_since(
        &self,
        event_types: &[&str],
        since: NaiveDateTime,
    ) -> AppResult<HashMap<String, i64>> {
        let types: Vec<String> = event_types.iter().map(|t| t.to_string()).collect();
        let rows = sqlx::query(
            r#"
            SELECT event_type, COUNT(*) as count
            FROM audit_events
            WHERE event_type = ANY($1) AND created_at >= $2
            GROUP BY event_type
            "#,
        )
        .bind(&types)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("event_type"), row.get("count")))
            .collect())
    }
}
