use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{LockRegistry, RegistryError};

#[derive(Debug, Default)]
struct State {
    expired: HashSet<i64>,
    deliveries: HashMap<String, OffsetDateTime>,
    notify: BTreeMap<String, bool>,
}

/// Process-local [`LockRegistry`], for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryLockRegistry {
    state: Mutex<State>,
}

impl MemoryLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Record a delivery as seen at an explicit instant.
    pub fn claim_delivery_at(&self, delivery_id: &str, at: OffsetDateTime) -> bool {
        self.with(|s| {
            if s.deliveries.contains_key(delivery_id) {
                false
            } else {
                s.deliveries.insert(delivery_id.to_owned(), at);
                true
            }
        })
    }

    pub fn expired_count(&self) -> usize {
        self.with(|s| s.expired.len())
    }
}

#[async_trait]
impl LockRegistry for MemoryLockRegistry {
    async fn is_expired(&self, team_id: i64) -> Result<bool, RegistryError> {
        Ok(self.with(|s| s.expired.contains(&team_id)))
    }

    async fn expire(&self, team_id: i64) -> Result<bool, RegistryError> {
        Ok(self.with(|s| s.expired.insert(team_id)))
    }

    async fn claim_delivery(&self, delivery_id: &str) -> Result<bool, RegistryError> {
        Ok(self.claim_delivery_at(delivery_id, OffsetDateTime::now_utc()))
    }

    async fn purge_deliveries(&self, seen_before: OffsetDateTime) -> Result<u64, RegistryError> {
        Ok(self.with(|s| {
            let before = s.deliveries.len();
            s.deliveries.retain(|_, seen| *seen >= seen_before);
            (before - s.deliveries.len()) as u64
        }))
    }

    async fn set_notify(&self, chat_id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.with(|s| s.notify.insert(chat_id.to_owned(), enabled));
        Ok(())
    }

    async fn notify_targets(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.with(|s| {
            s.notify
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(chat_id, _)| chat_id.clone())
                .collect()
        }))
    }
}
