use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
/// Record a webhook delivery id.
///
/// Returns `false` when the id was seen before.
pub struct ClaimDelivery {
    pub delivery_id: String,
}

impl Processor<ClaimDelivery> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimDelivery")]
    async fn process(&self, claim: ClaimDelivery) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (delivery_id)
            VALUES ($1)
            ON CONFLICT (delivery_id) DO NOTHING
            "#,
        )
        .bind(claim.delivery_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone, Copy)]
/// Forget delivery ids seen before a cutoff.
pub struct PurgeDeliveries {
    pub seen_before: OffsetDateTime,
}

impl Processor<PurgeDeliveries> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeDeliveries")]
    async fn process(&self, purge: PurgeDeliveries) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_deliveries
            WHERE seen_at < $1
            "#,
        )
        .bind(purge.seen_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
