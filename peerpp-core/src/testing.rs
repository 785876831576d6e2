//! In-memory stand-ins for Intra and Slack.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use peerpp_sdk::objects::webhook::{HookProject, HookScale, HookTeam, HookUser};
use peerpp_sdk::objects::{ScaleTeamHook, UserRef};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use crate::chat::{ChatApi, ChatError};
use crate::config::{PlatformConfig, PolicyConfig, WatchedProject};
use crate::identity::PlatformUser;
use crate::platform::{
    Booking, EvaluationLock, PlatformApi, PlatformError, TeamMember, UserKey,
};

pub const BOT_ID: i64 = 1;
pub const CAMPUS_ID: i64 = 14;
pub const CURSUS_ID: i64 = 21;
pub const EVALUATOR_GROUP: i64 = 77;
pub const LIBFT: i64 = 1314;
pub const PRINTF: i64 = 1327;

pub fn platform_config() -> PlatformConfig {
    PlatformConfig {
        bot_user_id: BOT_ID,
        campus_id: CAMPUS_ID,
        cursus_id: CURSUS_ID,
        evaluator_group_id: EVALUATOR_GROUP,
    }
}

pub fn policy(chance: u8) -> Arc<RwLock<PolicyConfig>> {
    Arc::new(RwLock::new(PolicyConfig {
        projects: vec![
            WatchedProject {
                id: LIBFT,
                slug: "libft".into(),
            },
            WatchedProject {
                id: PRINTF,
                slug: "ft_printf".into(),
            },
        ],
        random_booking_chance: chance,
        lock_expiration_days: 14,
    }))
}

pub fn email_of(login: &str) -> String {
    format!("{login}@student.codam.nl")
}

/// Mutating platform calls, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Book(Booking),
    Delete(i64),
}

#[derive(Debug, Clone)]
struct FakeTeam {
    name: String,
    project_id: i64,
    members: Vec<(UserRef, bool)>,
}

#[derive(Debug, Default)]
struct PlatformState {
    next_id: i64,
    locks: Vec<EvaluationLock>,
    users: HashMap<i64, PlatformUser>,
    teams: HashMap<i64, FakeTeam>,
    validated: HashSet<(i64, i64)>,
    groups: HashSet<(i64, i64)>,
    minimum_mark: Option<i64>,
    calls: Vec<Call>,
    fail_deletes: bool,
    fail_bookings: bool,
    fail_lookups: bool,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
    user_lookups: AtomicUsize,
}

impl FakePlatform {
    fn with<R>(&self, f: impl FnOnce(&mut PlatformState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn add_user(&self, id: i64, login: &str, level: f64) {
        self.add_user_with(id, login, Some(level), false, CAMPUS_ID);
    }

    pub fn add_staff(&self, id: i64, login: &str, campus_id: i64) {
        self.add_user_with(id, login, Some(0.0), true, campus_id);
    }

    pub fn add_user_with(
        &self,
        id: i64,
        login: &str,
        level: Option<f64>,
        staff: bool,
        campus_id: i64,
    ) {
        let user = PlatformUser {
            id,
            login: login.to_owned(),
            email: email_of(login),
            staff,
            level,
            campus_id,
        };
        self.with(|s| s.users.insert(id, user));
    }

    /// Register a team; the first member is the leader.
    pub fn add_team(&self, team_id: i64, project_id: i64, members: &[i64]) {
        self.with(|s| {
            let members: Vec<(UserRef, bool)> = members
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    let login = s
                        .users
                        .get(id)
                        .map(|u| u.login.clone())
                        .unwrap_or_else(|| format!("user{id}"));
                    (UserRef { id: *id, login }, i == 0)
                })
                .collect();
            let name = members
                .first()
                .map(|(u, _)| format!("{}'s group", u.login))
                .unwrap_or_default();
            s.teams.insert(
                team_id,
                FakeTeam {
                    name,
                    project_id,
                    members,
                },
            );
        });
    }

    pub fn validate(&self, user_id: i64, project_id: i64) {
        self.with(|s| s.validated.insert((user_id, project_id)));
    }

    pub fn join_group(&self, user_id: i64, group_id: i64) {
        self.with(|s| s.groups.insert((user_id, group_id)));
    }

    pub fn set_minimum_mark(&self, mark: i64) {
        self.with(|s| s.minimum_mark = Some(mark));
    }

    pub fn fail_deletes(&self) {
        self.with(|s| s.fail_deletes = true);
    }

    pub fn fail_bookings(&self) {
        self.with(|s| s.fail_bookings = true);
    }

    pub fn fail_lookups(&self) {
        self.with(|s| s.fail_lookups = true);
    }

    /// Add an upcoming evaluation of a registered team, bypassing the call log.
    pub fn insert_evaluation(
        &self,
        scale_id: i64,
        team_id: i64,
        corrector_id: i64,
        final_mark: Option<i64>,
        created_at: OffsetDateTime,
    ) -> i64 {
        let begin_at = OffsetDateTime::now_utc() + Duration::days(1);
        self.with(|s| s.insert(scale_id, team_id, corrector_id, final_mark, created_at, begin_at))
    }

    /// Add an unmarked evaluation with an explicit begin time.
    pub fn insert_evaluation_at(
        &self,
        scale_id: i64,
        team_id: i64,
        corrector_id: i64,
        created_at: OffsetDateTime,
        begin_at: OffsetDateTime,
    ) -> i64 {
        self.with(|s| s.insert(scale_id, team_id, corrector_id, None, created_at, begin_at))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn locks(&self) -> Vec<EvaluationLock> {
        self.with(|s| s.locks.clone())
    }

    /// Placeholders owned by the service account for one team.
    pub fn placeholders_of(&self, team_id: i64) -> usize {
        self.with(|s| {
            s.locks
                .iter()
                .filter(|l| l.team_id == team_id && l.corrector_id() == Some(BOT_ID))
                .count()
        })
    }

    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }
}

impl PlatformState {
    fn insert(
        &mut self,
        scale_id: i64,
        team_id: i64,
        corrector_id: i64,
        final_mark: Option<i64>,
        created_at: OffsetDateTime,
        begin_at: OffsetDateTime,
    ) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let team = self.teams.get(&team_id).cloned().unwrap_or(FakeTeam {
            name: format!("team{team_id}"),
            project_id: LIBFT,
            members: Vec::new(),
        });
        let corrector_login = if corrector_id == BOT_ID {
            "peerpp".to_owned()
        } else {
            self.users
                .get(&corrector_id)
                .map(|u| u.login.clone())
                .unwrap_or_else(|| format!("user{corrector_id}"))
        };
        let slug = match team.project_id {
            LIBFT => "libft".to_owned(),
            PRINTF => "ft_printf".to_owned(),
            other => format!("unknown-{other}"),
        };
        self.locks.push(EvaluationLock {
            id,
            scale_id,
            team_id,
            team_name: team.name,
            project_id: team.project_id,
            project_slug: slug,
            created_at,
            begin_at: Some(begin_at),
            final_mark,
            corrector: Some(UserRef {
                id: corrector_id,
                login: corrector_login,
            }),
            correcteds: team.members.into_iter().map(|(u, _)| u).collect(),
        });
        id
    }
}

fn rejected(operation: &'static str) -> PlatformError {
    PlatformError::Rejected {
        operation,
        status: 500,
        body: "internal server error".into(),
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn bot_locks(&self) -> Result<Vec<EvaluationLock>, PlatformError> {
        // Intra is queried with `filter[future]`.
        let now = OffsetDateTime::now_utc();
        Ok(self.with(|s| {
            s.locks
                .iter()
                .filter(|l| l.corrector_id() == Some(BOT_ID))
                .filter(|l| l.begin_at.is_some_and(|b| b > now))
                .cloned()
                .collect()
        }))
    }

    async fn evaluations(
        &self,
        project_id: i64,
        scale_id: i64,
        team_id: i64,
    ) -> Result<Vec<EvaluationLock>, PlatformError> {
        self.with(|s| {
            if s.fail_lookups {
                return Err(rejected("list evaluations"));
            }
            Ok(s.locks
                .iter()
                .filter(|l| {
                    l.project_id == project_id && l.scale_id == scale_id && l.team_id == team_id
                })
                .cloned()
                .collect())
        })
    }

    async fn book_evaluation(&self, booking: Booking) -> Result<(), PlatformError> {
        self.with(|s| {
            if s.fail_bookings {
                return Err(rejected("book evaluation"));
            }
            s.calls.push(Call::Book(booking.clone()));
            s.insert(
                booking.scale_id,
                booking.team_id,
                booking.corrector_id,
                None,
                OffsetDateTime::now_utc(),
                booking.begin_at,
            );
            Ok(())
        })
    }

    async fn delete_evaluation(&self, scale_team_id: i64) -> Result<(), PlatformError> {
        self.with(|s| {
            if s.fail_deletes {
                return Err(rejected("delete evaluation"));
            }
            s.calls.push(Call::Delete(scale_team_id));
            s.locks.retain(|l| l.id != scale_team_id);
            Ok(())
        })
    }

    async fn user(&self, key: &UserKey) -> Result<PlatformUser, PlatformError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.with(|s| {
            let found = match key {
                UserKey::Id(id) => s.users.get(id),
                UserKey::Login(login) => s.users.values().find(|u| &u.login == login),
            };
            found
                .cloned()
                .ok_or_else(|| PlatformError::UserNotFound(key.to_string()))
        })
    }

    async fn team_users(&self, team_id: i64) -> Result<Vec<TeamMember>, PlatformError> {
        Ok(self.with(|s| {
            s.teams
                .get(&team_id)
                .map(|t| {
                    t.members
                        .iter()
                        .map(|(u, leader)| TeamMember {
                            user_id: u.id,
                            leader: *leader,
                        })
                        .collect()
                })
                .unwrap_or_default()
        }))
    }

    async fn validated_project(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<bool, PlatformError> {
        Ok(self.with(|s| s.validated.contains(&(user_id, project_id))))
    }

    async fn minimum_mark(&self, _project_id: i64) -> Result<i64, PlatformError> {
        Ok(self.with(|s| s.minimum_mark.unwrap_or(50)))
    }

    async fn in_group(&self, user_id: i64, group_id: i64) -> Result<bool, PlatformError> {
        Ok(self.with(|s| s.groups.contains(&(user_id, group_id))))
    }

    async fn add_to_group(&self, user_id: i64, group_id: i64) -> Result<(), PlatformError> {
        self.with(|s| s.groups.insert((user_id, group_id)));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ChatState {
    removed: HashSet<String>,
    sent: Vec<(String, String)>,
    fail_sends: bool,
}

/// Every `login@student.codam.nl` is a member with chat id `U-login`.
#[derive(Debug, Default)]
pub struct FakeChat {
    state: Mutex<ChatState>,
}

impl FakeChat {
    fn with<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn remove_member(&self, email: &str) {
        self.with(|s| s.removed.insert(email.to_owned()));
    }

    pub fn fail_sends(&self) {
        self.with(|s| s.fail_sends = true);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.with(|s| s.sent.clone())
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<String> {
        self.with(|s| {
            s.sent
                .iter()
                .filter(|(to, _)| to == chat_id)
                .map(|(_, text)| text.clone())
                .collect()
        })
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn display_name(&self, chat_id: &str) -> Result<String, ChatError> {
        let login = chat_id
            .strip_prefix("U-")
            .ok_or_else(|| ChatError::NotFound(chat_id.to_owned()))?;
        if self.with(|s| s.removed.contains(&email_of(login))) {
            return Err(ChatError::NotFound(chat_id.to_owned()));
        }
        Ok(login.to_owned())
    }

    async fn chat_id_for_email(&self, email: &str) -> Result<String, ChatError> {
        if self.with(|s| s.removed.contains(email)) {
            return Err(ChatError::NotFound(email.to_owned()));
        }
        let local = email
            .split('@')
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ChatError::NotFound(email.to_owned()))?;
        Ok(format!("U-{local}"))
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChatError> {
        self.with(|s| {
            if s.fail_sends {
                return Err(ChatError::NotFound(chat_id.to_owned()));
            }
            s.sent.push((chat_id.to_owned(), text.to_owned()));
            Ok(())
        })
    }
}

/// A scale-team hook for team 9 on scale 3 (three corrections).
pub fn hook(evaluator: Option<(i64, &str)>, project_id: i64) -> ScaleTeamHook {
    ScaleTeamHook {
        id: 500,
        team: HookTeam {
            id: 9,
            name: "jdoe's group".into(),
            project_id,
        },
        scale: HookScale {
            id: 3,
            correction_number: 3,
        },
        project: HookProject {
            id: project_id,
            name: "Libft".into(),
            slug: "libft".into(),
        },
        user: evaluator.map(|(id, login)| HookUser {
            id,
            login: login.into(),
        }),
        truant: None,
        final_mark: None,
    }
}
