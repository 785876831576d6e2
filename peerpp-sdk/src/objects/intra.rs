//! Response and request bodies of the Intra v2 API.
//!
//! Only the fields the coordinator reads are modelled; everything else in
//! the payloads is ignored by serde.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Compact user reference embedded in scale teams (`corrector`, `correcteds`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub login: String,
}

/// Intra replaces participants of upcoming evaluations with the string
/// `"invisible"` unless the token owner may see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Visible<T> {
    Shown(T),
    Hidden(String),
}

impl<T> Visible<T> {
    pub fn shown(&self) -> Option<&T> {
        match self {
            Visible::Shown(value) => Some(value),
            Visible::Hidden(_) => None,
        }
    }
}

/// Team as embedded in a scale team listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTeamTeam {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
}

/// One evaluation slot (`/users/{id}/scale_teams`, `/projects/{id}/scale_teams`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTeam {
    pub id: i64,
    pub scale_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub begin_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub final_mark: Option<i64>,
    pub corrector: Visible<UserRef>,
    pub correcteds: Visible<Vec<UserRef>>,
    pub team: ScaleTeamTeam,
}

/// Entry of `/teams/{id}/teams_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamUser {
    pub id: i64,
    pub team_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub leader: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Entry of `/users/{id}/projects_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUser {
    pub id: i64,
    pub project: ProjectRef,
    #[serde(default, rename = "validated?")]
    pub validated: Option<bool>,
    #[serde(default)]
    pub final_mark: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursusUser {
    pub cursus_id: i64,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampusUser {
    pub campus_id: i64,
    #[serde(default)]
    pub is_primary: bool,
}

/// `GET /users/{id|login}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntraUser {
    pub id: i64,
    pub login: String,
    pub email: String,
    #[serde(default, rename = "staff?")]
    pub staff: bool,
    #[serde(default)]
    pub cursus_users: Vec<CursusUser>,
    #[serde(default)]
    pub campus_users: Vec<CampusUser>,
}

impl IntraUser {
    /// Level in the given cursus, if the user is enrolled in it.
    pub fn level_in(&self, cursus_id: i64) -> Option<f64> {
        self.cursus_users
            .iter()
            .find(|c| c.cursus_id == cursus_id)
            .map(|c| c.level)
    }

    /// Primary campus, falling back to the first listed campus.
    pub fn primary_campus(&self) -> Option<i64> {
        self.campus_users
            .iter()
            .find(|c| c.is_primary)
            .or_else(|| self.campus_users.first())
            .map(|c| c.campus_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSession {
    #[serde(default)]
    pub campus_id: Option<i64>,
    #[serde(default)]
    pub cursus_id: Option<i64>,
    #[serde(default)]
    pub minimum_mark: Option<i64>,
}

/// `GET /projects/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDetails {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub project_sessions: Vec<ProjectSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Entry of `/users/{id}/groups_users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUser {
    pub id: i64,
    pub group: GroupRef,
    pub user_id: i64,
}

/// `POST /oauth/token` response of the client-credentials grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    pub created_at: i64,
}

impl AccessToken {
    /// Unix timestamp after which the token is no longer accepted.
    pub fn expires_at(&self) -> i64 {
        self.created_at + self.expires_in
    }
}

/// One booking inside `POST /scale_teams/multiple_create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScaleTeam {
    #[serde(with = "time::serde::rfc3339")]
    pub begin_at: OffsetDateTime,
    pub scale_id: i64,
    pub team_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleCreate {
    pub scale_teams: Vec<NewScaleTeam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUserCreate {
    pub group_id: i64,
    pub user_id: i64,
}

/// `POST /groups_users` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroupUser {
    pub groups_user: GroupUserCreate,
}
