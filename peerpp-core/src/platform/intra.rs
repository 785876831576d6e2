use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use peerpp_sdk::client::{IntraClient, Response};
use peerpp_sdk::objects::{
    GroupUser, IntraUser, MultipleCreate, NewGroupUser, NewScaleTeam, ProjectDetails,
    ProjectUser, ScaleTeam, TeamUser,
};
use peerpp_sdk::objects::intra::GroupUserCreate;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Booking, EvaluationLock, PlatformApi, PlatformError, TeamMember, UserKey};
use crate::config::{PlatformConfig, PolicyConfig};
use crate::identity::PlatformUser;

/// Campus assumed for users without any campus entry.
const DEFAULT_CAMPUS_ID: i64 = 1;

/// Passing mark used when a project has no session for the watched campus.
const DEFAULT_PASS_MARK: i64 = 50;

const NOT_FOUND: u16 = 404;

/// [`PlatformApi`] over the Intra v2 REST API.
pub struct IntraPlatform {
    client: Arc<IntraClient>,
    platform: PlatformConfig,
    policy: Arc<RwLock<PolicyConfig>>,
}

impl IntraPlatform {
    pub fn new(
        client: Arc<IntraClient>,
        platform: PlatformConfig,
        policy: Arc<RwLock<PolicyConfig>>,
    ) -> Self {
        Self {
            client,
            platform,
            policy,
        }
    }

    fn campus_filters(&self) -> [(&'static str, String); 2] {
        [
            ("filter[campus_id]", self.platform.campus_id.to_string()),
            ("filter[cursus_id]", self.platform.cursus_id.to_string()),
        ]
    }

    /// Drain a paged endpoint into scale teams.
    async fn scale_teams(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<ScaleTeam>, PlatformError> {
        let mut pages = std::pin::pin!(self.client.get_all_pages(path, query));
        let mut teams = Vec::new();
        while let Some(page) = pages.next().await {
            let page: Vec<ScaleTeam> = checked(operation, page?)?.json()?;
            teams.extend(page);
        }
        Ok(teams)
    }

    async fn slugs(&self) -> HashMap<i64, String> {
        let policy = self.policy.read().await;
        policy
            .projects
            .iter()
            .map(|p| (p.id, p.slug.clone()))
            .collect()
    }
}

fn checked(operation: &'static str, response: Response) -> Result<Response, PlatformError> {
    if response.ok {
        Ok(response)
    } else {
        Err(PlatformError::Rejected {
            operation,
            status: response.status.as_u16(),
            body: response.body,
        })
    }
}

fn to_lock(team: ScaleTeam, slugs: &HashMap<i64, String>) -> EvaluationLock {
    let project_id = team.team.project_id;
    EvaluationLock {
        id: team.id,
        scale_id: team.scale_id,
        team_id: team.team.id,
        team_name: team.team.name,
        project_id,
        project_slug: slugs
            .get(&project_id)
            .cloned()
            .unwrap_or_else(|| format!("unknown-{project_id}")),
        created_at: team.created_at,
        begin_at: team.begin_at,
        final_mark: team.final_mark,
        corrector: team.corrector.shown().cloned(),
        correcteds: team.correcteds.shown().cloned().unwrap_or_default(),
    }
}

fn user_path(key: &UserKey) -> String {
    match key {
        UserKey::Id(id) => format!("/users/{id}"),
        UserKey::Login(login) => format!("/users/{}", urlencoding::encode(login)),
    }
}

#[async_trait]
impl PlatformApi for IntraPlatform {
    async fn bot_locks(&self) -> Result<Vec<EvaluationLock>, PlatformError> {
        let slugs = self.slugs().await;
        let [campus, cursus] = self.campus_filters();
        let path = format!("/users/{}/scale_teams", self.platform.bot_user_id);
        let query = [("filter[future]", "true".to_owned()), campus, cursus];
        let teams = self.scale_teams("list placeholders", &path, &query).await?;
        Ok(teams.into_iter().map(|t| to_lock(t, &slugs)).collect())
    }

    async fn evaluations(
        &self,
        project_id: i64,
        scale_id: i64,
        team_id: i64,
    ) -> Result<Vec<EvaluationLock>, PlatformError> {
        let slugs = self.slugs().await;
        let [campus, cursus] = self.campus_filters();
        let path = format!("/projects/{project_id}/scale_teams");
        let query = [
            ("filter[scale_id]", scale_id.to_string()),
            ("filter[team_id]", team_id.to_string()),
            campus,
            cursus,
        ];
        let teams = self.scale_teams("list evaluations", &path, &query).await?;
        Ok(teams.into_iter().map(|t| to_lock(t, &slugs)).collect())
    }

    async fn book_evaluation(&self, booking: Booking) -> Result<(), PlatformError> {
        let body = MultipleCreate {
            scale_teams: vec![NewScaleTeam {
                begin_at: booking.begin_at,
                scale_id: booking.scale_id,
                team_id: booking.team_id,
                user_id: booking.corrector_id,
            }],
        };
        let response = self
            .client
            .post("/scale_teams/multiple_create", &body)
            .await?;
        checked("book evaluation", response)?;
        Ok(())
    }

    async fn delete_evaluation(&self, scale_team_id: i64) -> Result<(), PlatformError> {
        let response = self
            .client
            .delete(&format!("/scale_teams/{scale_team_id}"), None)
            .await?;
        if response.status.as_u16() == NOT_FOUND {
            debug!(scale_team_id, "Evaluation already gone");
            return Ok(());
        }
        checked("delete evaluation", response)?;
        Ok(())
    }

    async fn user(&self, key: &UserKey) -> Result<PlatformUser, PlatformError> {
        let response = self.client.get(&user_path(key), &[]).await?;
        if response.status.as_u16() == NOT_FOUND {
            return Err(PlatformError::UserNotFound(key.to_string()));
        }
        let user: IntraUser = checked("fetch user", response)?.json()?;
        Ok(PlatformUser {
            level: user.level_in(self.platform.cursus_id),
            campus_id: user.primary_campus().unwrap_or(DEFAULT_CAMPUS_ID),
            id: user.id,
            login: user.login,
            email: user.email,
            staff: user.staff,
        })
    }

    async fn team_users(&self, team_id: i64) -> Result<Vec<TeamMember>, PlatformError> {
        let response = self
            .client
            .get(&format!("/teams/{team_id}/teams_users"), &[])
            .await?;
        let users: Vec<TeamUser> = checked("list team users", response)?.json()?;
        Ok(users
            .into_iter()
            .map(|u| TeamMember {
                user_id: u.user_id,
                leader: u.leader,
            })
            .collect())
    }

    async fn validated_project(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<bool, PlatformError> {
        let response = self
            .client
            .get(
                &format!("/users/{user_id}/projects_users"),
                &[("filter[project_id]", project_id.to_string())],
            )
            .await?;
        let projects: Vec<ProjectUser> = checked("list projects users", response)?.json()?;
        Ok(projects
            .iter()
            .any(|p| p.project.id == project_id && p.validated == Some(true)))
    }

    async fn minimum_mark(&self, project_id: i64) -> Result<i64, PlatformError> {
        let response = self
            .client
            .get(&format!("/projects/{project_id}"), &self.campus_filters())
            .await?;
        let project: ProjectDetails = checked("fetch project", response)?.json()?;
        let campus_session = project
            .project_sessions
            .iter()
            .find(|s| s.campus_id == Some(self.platform.campus_id));
        let global_session = project
            .project_sessions
            .iter()
            .find(|s| s.campus_id.is_none());
        Ok(campus_session
            .or(global_session)
            .and_then(|s| s.minimum_mark)
            .unwrap_or(DEFAULT_PASS_MARK))
    }

    async fn in_group(&self, user_id: i64, group_id: i64) -> Result<bool, PlatformError> {
        let response = self
            .client
            .get(&format!("/users/{user_id}/groups_users"), &[])
            .await?;
        let groups: Vec<GroupUser> = checked("list groups", response)?.json()?;
        Ok(groups.iter().any(|g| g.group.id == group_id))
    }

    async fn add_to_group(&self, user_id: i64, group_id: i64) -> Result<(), PlatformError> {
        let body = NewGroupUser {
            groups_user: GroupUserCreate { group_id, user_id },
        };
        let response = self.client.post("/groups_users", &body).await?;
        checked("add group user", response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerpp_sdk::objects::{UserRef, Visible};
    use peerpp_sdk::objects::intra::ScaleTeamTeam;

    #[test]
    fn lock_from_hidden_scale_team() {
        let slugs = HashMap::from([(1314, "libft".to_owned())]);
        let team = ScaleTeam {
            id: 1,
            scale_id: 2,
            created_at: time::macros::datetime!(2024-03-01 10:00 UTC),
            begin_at: None,
            final_mark: None,
            corrector: Visible::Hidden("invisible".into()),
            correcteds: Visible::Shown(vec![UserRef {
                id: 5,
                login: "jdoe".into(),
            }]),
            team: ScaleTeamTeam {
                id: 9,
                name: "jdoe's group".into(),
                project_id: 1314,
            },
        };
        let lock = to_lock(team, &slugs);
        assert_eq!(lock.project_slug, "libft");
        assert!(lock.corrector.is_none());
        assert!(lock.is_corrected(5));
    }

    #[test]
    fn unwatched_project_gets_placeholder_slug() {
        let team = ScaleTeam {
            id: 1,
            scale_id: 2,
            created_at: time::macros::datetime!(2024-03-01 10:00 UTC),
            begin_at: None,
            final_mark: Some(80),
            corrector: Visible::Shown(UserRef {
                id: 1,
                login: "bot".into(),
            }),
            correcteds: Visible::Hidden("invisible".into()),
            team: ScaleTeamTeam {
                id: 9,
                name: "t".into(),
                project_id: 42,
            },
        };
        let lock = to_lock(team, &HashMap::new());
        assert_eq!(lock.project_slug, "unknown-42");
        assert!(lock.correcteds.is_empty());
        assert_eq!(lock.corrector_id(), Some(1));
    }

    #[test]
    fn login_paths_are_encoded() {
        assert_eq!(user_path(&UserKey::Id(5)), "/users/5");
        assert_eq!(user_path(&UserKey::Login("a b".into())), "/users/a%20b");
    }
}
