use async_trait::async_trait;
use kanau::processor::Processor;
use time::OffsetDateTime;

use super::{LockRegistry, RegistryError};
use crate::entities::expired_teams::{InsertExpiredTeam, IsTeamExpired};
use crate::entities::notification_preferences::{
    GetNotifiableEvaluators, SetNotificationPreference,
};
use crate::entities::webhook_deliveries::{ClaimDelivery, PurgeDeliveries};
use crate::framework::DatabaseProcessor;

/// [`LockRegistry`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgLockRegistry {
    db: DatabaseProcessor,
}

impl PgLockRegistry {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LockRegistry for PgLockRegistry {
    async fn is_expired(&self, team_id: i64) -> Result<bool, RegistryError> {
        Ok(self.db.process(IsTeamExpired { team_id }).await?)
    }

    async fn expire(&self, team_id: i64) -> Result<bool, RegistryError> {
        Ok(self.db.process(InsertExpiredTeam { team_id }).await?)
    }

    async fn claim_delivery(&self, delivery_id: &str) -> Result<bool, RegistryError> {
        let claim = ClaimDelivery {
            delivery_id: delivery_id.to_owned(),
        };
        Ok(self.db.process(claim).await?)
    }

    async fn purge_deliveries(&self, seen_before: OffsetDateTime) -> Result<u64, RegistryError> {
        Ok(self.db.process(PurgeDeliveries { seen_before }).await?)
    }

    async fn set_notify(&self, chat_id: &str, enabled: bool) -> Result<(), RegistryError> {
        let cmd = SetNotificationPreference {
            chat_id: chat_id.to_owned(),
            enabled,
        };
        Ok(self.db.process(cmd).await?)
    }

    async fn notify_targets(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.db.process(GetNotifiableEvaluators).await?)
    }
}
