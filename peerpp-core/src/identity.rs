//! A person across the two systems the coordinator talks to.
//!
//! Intra knows a user by id or login, Slack by member id or email. An
//! [`IncompleteIdentity`] holds whatever subset is known; the
//! [`UserResolver`](crate::resolver::UserResolver) turns it into a complete
//! [`Identity`].

use peerpp_sdk::objects::UserRef;

/// Identifier a cached identity can be found under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    PlatformId(i64),
    Login(String),
    ChatId(String),
    Email(String),
}

/// Fields fetched from the platform user profile.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformUser {
    pub id: i64,
    pub login: String,
    pub email: String,
    pub staff: bool,
    /// Level in the configured cursus; `None` when not enrolled.
    pub level: Option<f64>,
    pub campus_id: i64,
}

/// Any subset of what is known about a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncompleteIdentity {
    pub platform_id: Option<i64>,
    pub login: Option<String>,
    pub chat_id: Option<String>,
    pub email: Option<String>,
    pub level: Option<f64>,
    pub staff: Option<bool>,
    pub campus_id: Option<i64>,
}

/// A fully resolved user.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub platform_id: i64,
    pub login: String,
    pub chat_id: String,
    pub email: String,
    pub level: f64,
    pub staff: bool,
    pub campus_id: i64,
}

impl IncompleteIdentity {
    pub fn from_platform_id(id: i64) -> Self {
        Self {
            platform_id: Some(id),
            ..Self::default()
        }
    }

    pub fn from_login(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            ..Self::default()
        }
    }

    pub fn from_chat_id(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            ..Self::default()
        }
    }

    pub fn from_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Known identifiers, most specific first.
    pub fn keys(&self) -> Vec<IdentityKey> {
        let mut keys = Vec::with_capacity(4);
        if let Some(id) = self.platform_id {
            keys.push(IdentityKey::PlatformId(id));
        }
        if let Some(login) = &self.login {
            keys.push(IdentityKey::Login(login.clone()));
        }
        if let Some(chat_id) = &self.chat_id {
            keys.push(IdentityKey::ChatId(chat_id.clone()));
        }
        if let Some(email) = &self.email {
            keys.push(IdentityKey::Email(email.clone()));
        }
        keys
    }

    /// Number of fields still unknown.
    pub fn missing(&self) -> usize {
        [
            self.platform_id.is_none(),
            self.login.is_none(),
            self.chat_id.is_none(),
            self.email.is_none(),
            self.level.is_none(),
            self.staff.is_none(),
            self.campus_id.is_none(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }

    pub fn has_platform_key(&self) -> bool {
        self.platform_id.is_some() || self.login.is_some()
    }

    /// Whether every field the platform profile provides is known.
    pub fn has_platform_profile(&self) -> bool {
        self.platform_id.is_some()
            && self.login.is_some()
            && self.email.is_some()
            && self.level.is_some()
            && self.staff.is_some()
            && self.campus_id.is_some()
    }

    /// Merge a platform profile, keeping fields that are already known.
    pub fn merge_platform(&mut self, user: PlatformUser) {
        self.platform_id.get_or_insert(user.id);
        self.login.get_or_insert(user.login);
        self.email.get_or_insert(user.email);
        self.staff.get_or_insert(user.staff);
        self.campus_id.get_or_insert(user.campus_id);
        if self.level.is_none() {
            self.level = user.level;
        }
    }

    pub fn complete(&self) -> Option<Identity> {
        Some(Identity {
            platform_id: self.platform_id?,
            login: self.login.clone()?,
            chat_id: self.chat_id.clone()?,
            email: self.email.clone()?,
            level: self.level?,
            staff: self.staff?,
            campus_id: self.campus_id?,
        })
    }
}

impl From<&UserRef> for IncompleteIdentity {
    fn from(user: &UserRef) -> Self {
        Self {
            platform_id: Some(user.id),
            login: Some(user.login.clone()),
            ..Self::default()
        }
    }
}

impl Identity {
    /// Every identifier this identity can be looked up by.
    pub fn keys(&self) -> [IdentityKey; 4] {
        [
            IdentityKey::PlatformId(self.platform_id),
            IdentityKey::Login(self.login.clone()),
            IdentityKey::ChatId(self.chat_id.clone()),
            IdentityKey::Email(self.email.clone()),
        ]
    }
}
