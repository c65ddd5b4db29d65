use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::adapters::persistence::PostgresPersistence;
use crate::application::app_error::{AppError, AppResult};
use crate::application::ports::record_store::{SubscriptionRepoTrait, SubscriptionUpsert};
use crate::domain::entities::subscription::{SubscriptionRecord, SubscriptionStatus};

const SELECT_COLS: &str = r#"
    id, stripe_subscription_id, stripe_customer_id, user_id, status, price_id,
    current_period_start, current_period_end, cancel_at_period_end, canceled_at,
    metadata, created_at, updated_at
"#;

fn row_to_record(row: sqlx::postgres::PgRow) -> SubscriptionRecord {
    SubscriptionRecord {
        id: row.get("id"),
        stripe_subscription_id: row.get("stripe_subscription_id"),
        stripe_customer_id: row.get("stripe_customer_id"),
        user_id: row.get("user_id"),
        status: row.get("status"),
        price_id: row.get("price_id"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        canceled_at: row.get("canceled_at"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl SubscriptionRepoTrait for PostgresPersistence {
    async fn upsert(&self, sub: &SubscriptionUpsert) -> AppResult<SubscriptionRecord> {
        let id = Uuid::new_v4();
        // The provider's reported state always wins, including status
        // regressions on out-of-order delivery. price_id keeps the last
        // known value when an event omits line items.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscription_records (
                id, stripe_subscription_id, stripe_customer_id, user_id, status, price_id,
                current_period_start, current_period_end, cancel_at_period_end, canceled_at, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (stripe_subscription_id) DO UPDATE SET
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                status = EXCLUDED.status,
                price_id = COALESCE(EXCLUDED.price_id, subscription_records.price_id),
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                canceled_at = EXCLUDED.canceled_at,
                metadata = EXCLUDED.metadata,
                user_id = COALESCE(subscription_records.user_id, EXCLUDED.user_id),
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_customer_id)
        .bind(sub.user_id)
        .bind(sub.status)
        .bind(&sub.price_id)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(sub.cancel_at_period_end)
        .bind(sub.canceled_at)
        .bind(&sub.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_record(row))
    }

    async fn get_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_records WHERE stripe_subscription_id = $1",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_record))
    }

    async fn update_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
        cancel_at_period_end: bool,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscription_records SET
                status = $2,
                cancel_at_period_end = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .bind(status)
        .bind(cancel_at_period_end)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                "Subscription status update failed - subscription {} not found",
                subscription_id
            );
        }
        Ok(())
    }
}
