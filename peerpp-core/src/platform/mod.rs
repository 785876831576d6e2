//! The evaluation platform as seen by the coordinator.
//!
//! [`PlatformApi`] is the seam between the booking logic and Intra: the
//! server wires in [`IntraPlatform`], tests an in-memory fake.

mod intra;

pub use intra::IntraPlatform;

use async_trait::async_trait;
use peerpp_sdk::client::ClientError;
use peerpp_sdk::objects::UserRef;
use thiserror::Error;
use time::OffsetDateTime;

use crate::identity::PlatformUser;

/// Errors surfaced by platform calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Transport failure or undecodable body.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Intra answered with a non-2xx status.
    #[error("platform rejected {operation} with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("user not found: {0}")]
    UserNotFound(String),
}

/// An evaluation slot ("scale team"), placeholder or real.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationLock {
    pub id: i64,
    pub scale_id: i64,
    pub team_id: i64,
    pub team_name: String,
    pub project_id: i64,
    pub project_slug: String,
    pub created_at: OffsetDateTime,
    pub begin_at: Option<OffsetDateTime>,
    pub final_mark: Option<i64>,
    /// `None` when Intra hides the corrector.
    pub corrector: Option<UserRef>,
    pub correcteds: Vec<UserRef>,
}

impl EvaluationLock {
    pub fn is_corrected(&self, platform_id: i64) -> bool {
        self.correcteds.iter().any(|c| c.id == platform_id)
    }

    pub fn corrector_id(&self) -> Option<i64> {
        self.corrector.as_ref().map(|c| c.id)
    }
}

/// A new evaluation to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub scale_id: i64,
    pub team_id: i64,
    pub corrector_id: i64,
    pub begin_at: OffsetDateTime,
}

/// A member of a project team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub user_id: i64,
    pub leader: bool,
}

/// How a user is addressed in `/users/{…}` paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserKey {
    Id(i64),
    Login(String),
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserKey::Id(id) => write!(f, "{id}"),
            UserKey::Login(login) => write!(f, "{login}"),
        }
    }
}

#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Upcoming evaluations booked on the service account.
    async fn bot_locks(&self) -> Result<Vec<EvaluationLock>, PlatformError>;

    /// Every evaluation of one (project, scale, team) tuple.
    async fn evaluations(
        &self,
        project_id: i64,
        scale_id: i64,
        team_id: i64,
    ) -> Result<Vec<EvaluationLock>, PlatformError>;

    async fn book_evaluation(&self, booking: Booking) -> Result<(), PlatformError>;

    /// Delete an evaluation slot. An already deleted slot counts as success.
    async fn delete_evaluation(&self, scale_team_id: i64) -> Result<(), PlatformError>;

    async fn user(&self, key: &UserKey) -> Result<PlatformUser, PlatformError>;

    async fn team_users(&self, team_id: i64) -> Result<Vec<TeamMember>, PlatformError>;

    /// Whether the user validated the project themselves.
    async fn validated_project(&self, user_id: i64, project_id: i64)
    -> Result<bool, PlatformError>;

    /// Lowest passing mark of a project on the watched campus.
    async fn minimum_mark(&self, project_id: i64) -> Result<i64, PlatformError>;

    async fn in_group(&self, user_id: i64, group_id: i64) -> Result<bool, PlatformError>;

    async fn add_to_group(&self, user_id: i64, group_id: i64) -> Result<(), PlatformError>;

    async fn mark_is_pass(&self, project_id: i64, mark: i64) -> Result<bool, PlatformError> {
        Ok(mark >= self.minimum_mark(project_id).await?)
    }
}
