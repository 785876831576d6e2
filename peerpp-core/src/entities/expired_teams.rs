use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, Copy)]
/// Whether a team already had its Peer++ evaluation.
pub struct IsTeamExpired {
    pub team_id: i64,
}

impl Processor<IsTeamExpired> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:IsTeamExpired")]
    async fn process(&self, query: IsTeamExpired) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM expired_teams WHERE team_id = $1)
            "#,
        )
        .bind(query.team_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[derive(Debug, Clone, Copy)]
/// Mark a team as expired.
///
/// Returns `true` only for the call that inserted the row.
pub struct InsertExpiredTeam {
    pub team_id: i64,
}

impl Processor<InsertExpiredTeam> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertExpiredTeam")]
    async fn process(&self, insert: InsertExpiredTeam) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO expired_teams (team_id)
            VALUES ($1)
            ON CONFLICT (team_id) DO NOTHING
            "#,
        )
        .bind(insert.team_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
