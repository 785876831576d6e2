use sqlx::PgPool;

/// Runs the database queries of [`crate::entities`] through `kanau` processors.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
