use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone)]
/// Opt an evaluator in or out of new-lock notifications.
pub struct SetNotificationPreference {
    pub chat_id: String,
    pub enabled: bool,
}

impl Processor<SetNotificationPreference> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetNotificationPreference")]
    async fn process(&self, cmd: SetNotificationPreference) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO notification_preferences (chat_id, enabled)
            VALUES ($1, $2)
            ON CONFLICT (chat_id)
            DO UPDATE SET enabled = EXCLUDED.enabled, updated_at = now()
            "#,
        )
        .bind(cmd.chat_id)
        .bind(cmd.enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
/// Chat ids of every evaluator that opted in.
pub struct GetNotifiableEvaluators;

impl Processor<GetNotifiableEvaluators> for DatabaseProcessor {
    type Output = Vec<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetNotifiableEvaluators")]
    async fn process(&self, _: GetNotifiableEvaluators) -> Result<Vec<String>, sqlx::Error> {
        let chat_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT chat_id FROM notification_preferences
            WHERE enabled
            ORDER BY chat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(chat_ids)
    }
}
