use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::PostgresPersistence;
use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::record_store::{PaymentRepoTrait, PaymentUpsert};
use crate::domain::entities::payment::{PaymentRecord, PaymentStatus};

const SELECT_COLS: &str = r#"
    id, stripe_payment_intent_id, user_id, amount_cents, currency,
    status, metadata, created_at, updated_at
"#;

fn row_to_record(row: sqlx::postgres::PgRow) -> PaymentRecord {
    PaymentRecord {
        id: row.get("id"),
        stripe_payment_intent_id: row.get("stripe_payment_intent_id"),
        user_id: row.get("user_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: row.get("status"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PaymentRepoTrait for PostgresPersistence {
    async fn upsert(&self, payment: &PaymentUpsert) -> AppResult<PaymentRecord> {
        let id = Uuid::new_v4();
        // Amount and currency are fixed at first sight of the intent;
        // replays and reconciliation only move status and metadata.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payment_records (
                id, stripe_payment_intent_id, user_id, amount_cents, currency, status, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (stripe_payment_intent_id) DO UPDATE SET
                status = EXCLUDED.status,
                metadata = EXCLUDED.metadata,
                user_id = COALESCE(payment_records.user_id, EXCLUDED.user_id),
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&payment.stripe_payment_intent_id)
        .bind(payment.user_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.status)
        .bind(&payment.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_record(row))
    }

    async fn get_by_intent_id(&self, intent_id: &str) -> AppResult<Option<PaymentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_records WHERE stripe_payment_intent_id = $1",
            SELECT_COLS
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn update_status(&self, intent_id: &str, status: PaymentStatus) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE payment_records SET
                status = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE stripe_payment_intent_id = $1
            "#,
        )
        .bind(intent_id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                "Payment status update failed - intent {} not found",
                intent_id
            );
        }
        Ok(())
    }
}
