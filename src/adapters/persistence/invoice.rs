use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::PostgresPersistence;
use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::record_store::{InvoiceRepoTrait, InvoiceUpsert};
use crate::domain::entities::invoice::InvoiceRecord;

const SELECT_COLS: &str = r#"
    id, stripe_invoice_id, user_id, subscription_id, amount_due_cents, amount_paid_cents,
    currency, status, attempt_count, metadata, created_at, updated_at
"#;

fn row_to_record(row: sqlx::postgres::PgRow) -> InvoiceRecord {
    InvoiceRecord {
        id: row.get("id"),
        stripe_invoice_id: row.get("stripe_invoice_id"),
        user_id: row.get("user_id"),
        subscription_id: row.get("subscription_id"),
        amount_due_cents: row.get("amount_due_cents"),
        amount_paid_cents: row.get("amount_paid_cents"),
        currency: row.get("currency"),
        status: row.get("status"),
        attempt_count: row.get("attempt_count"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl InvoiceRepoTrait for PostgresPersistence {
    async fn upsert(&self, invoice: &InvoiceUpsert) -> AppResult<InvoiceRecord> {
        let id = Uuid::new_v4();
        // attempt_count never regresses: a stale replay from an earlier
        // dunning attempt must not rewind the counter.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO invoice_records (
                id, stripe_invoice_id, user_id, subscription_id, amount_due_cents,
                amount_paid_cents, currency, status, attempt_count, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (stripe_invoice_id) DO UPDATE SET
                status = EXCLUDED.status,
                amount_paid_cents = EXCLUDED.amount_paid_cents,
                attempt_count = GREATEST(invoice_records.attempt_count, EXCLUDED.attempt_count),
                subscription_id = COALESCE(EXCLUDED.subscription_id, invoice_records.subscription_id),
                user_id = COALESCE(invoice_records.user_id, EXCLUDED.user_id),
                metadata = EXCLUDED.metadata,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&invoice.stripe_invoice_id)
        .bind(invoice.user_id)
        .bind(invoice.subscription_id)
        .bind(invoice.amount_due_cents)
        .bind(invoice.amount_paid_cents)
        .bind(&invoice.currency)
        .bind(invoice.status)
        .bind(invoice.attempt_count)
        .bind(&invoice.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_record(row))
    }

    async fn get_by_invoice_id(&self, invoice_id: &str) -> AppResult<Option<InvoiceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM invoice_records WHERE stripe_invoice_id = $1",
            SELECT_COLS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }
}
