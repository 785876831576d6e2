//! Everything the coordinator must remember across restarts.
//!
//! The set of expired teams is the core invariant: once a team is in it,
//! no placeholder is ever booked for that team again.

mod memory;
mod postgres;

pub use memory::MemoryLockRegistry;
pub use postgres::PgLockRegistry;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait LockRegistry: Send + Sync {
    async fn is_expired(&self, team_id: i64) -> Result<bool, RegistryError>;

    /// Mark a team expired. Returns `true` when this call did the marking.
    async fn expire(&self, team_id: i64) -> Result<bool, RegistryError>;

    /// Record a webhook delivery id. Returns `false` for a replay.
    async fn claim_delivery(&self, delivery_id: &str) -> Result<bool, RegistryError>;

    /// Forget delivery ids recorded before `seen_before`.
    async fn purge_deliveries(&self, seen_before: OffsetDateTime) -> Result<u64, RegistryError>;

    async fn set_notify(&self, chat_id: &str, enabled: bool) -> Result<(), RegistryError>;

    /// Chat ids of evaluators subscribed to new-lock notifications.
    async fn notify_targets(&self) -> Result<Vec<String>, RegistryError>;
}
