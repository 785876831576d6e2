//! Resolution of partial identities into complete ones.
//!
//! Resolution is an explicit fixed-point loop over [`ResolutionState`]:
//!
//! | state            | lookup                               | fills                               |
//! |------------------|--------------------------------------|-------------------------------------|
//! | `HasPlatformKey` | Intra `/users/{id or login}`         | id, login, email, level, staff, campus |
//! | `HasChatId`      | Slack profile display name           | login                               |
//! | `HasEmail`       | Slack lookup by email                | chat id                             |
//! | `Complete`       | -                                    | -                                   |
//!
//! Every step must shrink the number of unknown fields, otherwise the
//! identity is unresolvable. Results are cached for the process lifetime
//! under every identifier of the resolved identity.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::chat::{ChatApi, ChatError};
use crate::identity::{Identity, IdentityKey, IncompleteIdentity};
use crate::platform::{PlatformApi, PlatformError, UserKey};

/// Hard bound on resolution steps; four suffice for any starting subset.
const MAX_STEPS: usize = 8;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("identity unresolvable: {0}")]
    Unresolvable(String),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("chat error: {0}")]
    Chat(ChatError),
}

impl From<ChatError> for ResolveError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(who) => {
                Self::Unresolvable(format!("{who} has no chat account"))
            }
            other => Self::Chat(other),
        }
    }
}

/// Which lookup the next resolution step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    HasPlatformKey,
    HasChatId,
    HasEmail,
    Complete,
}

impl ResolutionState {
    /// Pick the next step for a partial identity, or `None` when no lookup
    /// can fill the remaining gap.
    pub fn of(partial: &IncompleteIdentity) -> Option<Self> {
        if partial.complete().is_some() {
            Some(Self::Complete)
        } else if partial.has_platform_key() && !partial.has_platform_profile() {
            Some(Self::HasPlatformKey)
        } else if !partial.has_platform_key() && partial.chat_id.is_some() {
            Some(Self::HasChatId)
        } else if partial.chat_id.is_none() && partial.email.is_some() {
            Some(Self::HasEmail)
        } else {
            None
        }
    }
}

/// Cached, bidirectional user resolution between Intra and Slack.
pub struct UserResolver {
    platform: Arc<dyn PlatformApi>,
    chat: Arc<dyn ChatApi>,
    cache: RwLock<HashMap<IdentityKey, Identity>>,
}

impl UserResolver {
    pub fn new(platform: Arc<dyn PlatformApi>, chat: Arc<dyn ChatApi>) -> Self {
        Self {
            platform,
            chat,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, partial: IncompleteIdentity) -> Result<Identity, ResolveError> {
        if partial.is_empty() {
            return Err(ResolveError::Unresolvable("no identifier given".into()));
        }
        if let Some(hit) = self.cached(&partial).await {
            return Ok(hit);
        }

        let mut partial = partial;
        for _ in 0..MAX_STEPS {
            let Some(state) = ResolutionState::of(&partial) else {
                return Err(ResolveError::Unresolvable(format!(
                    "no lookup can complete {:?}",
                    partial.keys()
                )));
            };
            if state == ResolutionState::Complete {
                break;
            }

            let before = partial.missing();
            self.step(state, &mut partial).await?;
            if partial.missing() >= before {
                warn!(?state, keys = ?partial.keys(), "Identity resolution made no progress");
                return Err(ResolveError::Unresolvable(format!(
                    "{state:?} lookup made no progress"
                )));
            }
        }

        let identity = partial.complete().ok_or_else(|| {
            ResolveError::Unresolvable(format!("gave up after {MAX_STEPS} steps"))
        })?;
        debug!(login = %identity.login, chat_id = %identity.chat_id, "Resolved identity");

        let mut cache = self.cache.write().await;
        for key in identity.keys() {
            cache.insert(key, identity.clone());
        }
        Ok(identity)
    }

    /// Number of cached identifiers.
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn cached(&self, partial: &IncompleteIdentity) -> Option<Identity> {
        let cache = self.cache.read().await;
        partial.keys().iter().find_map(|key| cache.get(key).cloned())
    }

    async fn step(
        &self,
        state: ResolutionState,
        partial: &mut IncompleteIdentity,
    ) -> Result<(), ResolveError> {
        match state {
            ResolutionState::HasPlatformKey => {
                let key = match (partial.platform_id, &partial.login) {
                    (Some(id), _) => UserKey::Id(id),
                    (None, Some(login)) => UserKey::Login(login.clone()),
                    (None, None) => return Ok(()),
                };
                let user = self.platform.user(&key).await.map_err(|e| match e {
                    PlatformError::UserNotFound(who) => {
                        ResolveError::Unresolvable(format!("{who} is not an Intra user"))
                    }
                    other => other.into(),
                })?;
                if user.level.is_none() {
                    return Err(ResolveError::Unresolvable(format!(
                        "{} is not enrolled in the watched cursus",
                        user.login
                    )));
                }
                partial.merge_platform(user);
            }
            ResolutionState::HasChatId => {
                if let Some(chat_id) = &partial.chat_id {
                    let login = self.chat.display_name(chat_id).await?;
                    partial.login = Some(login);
                }
            }
            ResolutionState::HasEmail => {
                if let Some(email) = &partial.email {
                    let chat_id = self.chat.chat_id_for_email(email).await?;
                    partial.chat_id = Some(chat_id);
                }
            }
            ResolutionState::Complete => {}
        }
        Ok(())
    }
}
