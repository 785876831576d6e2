//! Chat slash commands.
//!
//! Every command ends in one human-readable reply, failures included, so
//! [`CommandDesk`] never returns an error.

use std::convert::Infallible;
use std::sync::Arc;

use kanau::processor::Processor;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info};

use super::coordinator::{Coordinator, CoordinatorError};
use crate::identity::{Identity, IncompleteIdentity};
use crate::platform::{PlatformError, UserKey};
use crate::resolver::ResolveError;

const USAGE: &str = "Available commands: /projects, /evaluations, /book <project> [login], \
                     /notify-on, /notify-off, /add-evaluator <login>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Projects,
    Evaluations,
    Book {
        project: String,
        on_behalf: Option<String>,
    },
    NotifyOn,
    NotifyOff,
    AddEvaluator {
        login: String,
    },
    /// Known command with wrong arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    pub fn parse(command: &str, text: &str) -> Self {
        let mut args = text.split_whitespace();
        match command.trim_start_matches('/') {
            "projects" => Command::Projects,
            "evaluations" => Command::Evaluations,
            "book" => match (args.next(), args.next(), args.next()) {
                (Some(project), on_behalf, None) => Command::Book {
                    project: project.to_owned(),
                    on_behalf: on_behalf.map(str::to_owned),
                },
                _ => Command::Usage("Usage: /book <project> [login]"),
            },
            "notify-on" => Command::NotifyOn,
            "notify-off" => Command::NotifyOff,
            "add-evaluator" => match (args.next(), args.next()) {
                (Some(login), None) => Command::AddEvaluator {
                    login: login.to_owned(),
                },
                _ => Command::Usage("Usage: /add-evaluator <login>"),
            },
            other => Command::Unknown(other.to_owned()),
        }
    }
}

/// A command together with the chat member who sent it.
#[derive(Debug, Clone)]
pub struct ChatCommand {
    pub invoker_chat_id: String,
    pub command: Command,
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("{0}")]
    Refused(String),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl CommandError {
    fn reply(self) -> String {
        match self {
            CommandError::Refused(reason)
            | CommandError::Coordinator(CoordinatorError::NothingToDo(reason))
            | CommandError::Coordinator(CoordinatorError::NotEligible(reason)) => reason,
            CommandError::Resolve(ResolveError::Unresolvable(reason))
            | CommandError::Coordinator(CoordinatorError::Resolve(
                ResolveError::Unresolvable(reason),
            )) => format!("I could not find that user: {reason}."),
            other => {
                error!(error = %other, "Chat command failed");
                format!("Something went wrong: {other}. Please inform staff.")
            }
        }
    }
}

pub struct CommandDesk {
    coordinator: Arc<Coordinator>,
}

impl CommandDesk {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    async fn invoker(&self, chat_id: &str) -> Result<Identity, CommandError> {
        Ok(self
            .coordinator
            .resolver()
            .resolve(IncompleteIdentity::from_chat_id(chat_id))
            .await?)
    }

    /// Staff of the watched campus.
    fn is_admin(&self, who: &Identity) -> bool {
        who.staff && who.campus_id == self.coordinator.config().campus_id
    }

    async fn require_evaluator(&self, who: &Identity) -> Result<(), CommandError> {
        let group = self.coordinator.config().evaluator_group_id;
        if self
            .coordinator
            .platform()
            .in_group(who.platform_id, group)
            .await?
        {
            Ok(())
        } else {
            Err(CommandError::Refused(
                "Only Peer++ evaluators can do that. Ask staff to add you.".into(),
            ))
        }
    }

    async fn toggle_notify(&self, chat_id: &str, enabled: bool) -> Result<String, CommandError> {
        let invoker = self.invoker(chat_id).await?;
        self.require_evaluator(&invoker).await?;
        self.coordinator.set_notify(&invoker.chat_id, enabled).await?;
        Ok(if enabled {
            "You will be notified of new Peer++ evaluations.".into()
        } else {
            "You will no longer be notified of new Peer++ evaluations.".into()
        })
    }

    async fn run(&self, cmd: ChatCommand) -> Result<String, CommandError> {
        match cmd.command {
            Command::Projects => {
                let policy = self.coordinator.policy().read().await;
                if policy.projects.is_empty() {
                    return Ok("No projects are watched.".into());
                }
                let slugs: Vec<&str> = policy.projects.iter().map(|p| p.slug.as_str()).collect();
                Ok(format!("Peer++ projects: {}", slugs.join(", ")))
            }
            Command::Evaluations => {
                let queues = self.coordinator.list_locks().await?;
                if queues.is_empty() {
                    return Ok("No teams are waiting for a Peer++ evaluation.".into());
                }
                let now = OffsetDateTime::now_utc();
                let lines: Vec<String> = queues
                    .iter()
                    .map(|q| {
                        format!(
                            "{}: {} waiting, oldest for {} days",
                            q.slug,
                            q.teams,
                            (now - q.oldest).whole_days()
                        )
                    })
                    .collect();
                Ok(lines.join("\n"))
            }
            Command::Book { project, on_behalf } => {
                let invoker = self.invoker(&cmd.invoker_chat_id).await?;
                let corrector = match on_behalf {
                    Some(login) => {
                        if !self.is_admin(&invoker) {
                            return Err(CommandError::Refused(
                                "Only staff can book for someone else.".into(),
                            ));
                        }
                        self.coordinator
                            .resolver()
                            .resolve(IncompleteIdentity::from_login(login))
                            .await?
                    }
                    None => invoker,
                };
                let receipt = self
                    .coordinator
                    .book_for_project(&corrector, &project)
                    .await?;
                info!(
                    corrector = %corrector.login,
                    team = %receipt.lock.team_name,
                    "Placeholder taken over from chat"
                );
                Ok(format!(
                    "{} will evaluate {} on {}. The evaluation starts in 20 minutes.",
                    corrector.login, receipt.lock.team_name, receipt.lock.project_slug
                ))
            }
            Command::NotifyOn => self.toggle_notify(&cmd.invoker_chat_id, true).await,
            Command::NotifyOff => self.toggle_notify(&cmd.invoker_chat_id, false).await,
            Command::AddEvaluator { login } => {
                let invoker = self.invoker(&cmd.invoker_chat_id).await?;
                if !self.is_admin(&invoker) {
                    return Err(CommandError::Refused(
                        "Only staff can add evaluators.".into(),
                    ));
                }
                let platform = self.coordinator.platform();
                let user = match platform.user(&UserKey::Login(login.clone())).await {
                    Ok(user) => user,
                    Err(PlatformError::UserNotFound(_)) => {
                        return Err(CommandError::Refused(format!("{login} is not an Intra user.")));
                    }
                    Err(e) => return Err(e.into()),
                };
                let group = self.coordinator.config().evaluator_group_id;
                if platform.in_group(user.id, group).await? {
                    return Ok(format!("{} already is a Peer++ evaluator.", user.login));
                }
                platform.add_to_group(user.id, group).await?;
                info!(login = %user.login, by = %invoker.login, "Added Peer++ evaluator");
                Ok(format!("{} is now a Peer++ evaluator.", user.login))
            }
            Command::Usage(usage) => Ok(usage.to_owned()),
            Command::Unknown(name) => Ok(format!("Unknown command /{name}. {USAGE}")),
        }
    }
}

impl Processor<ChatCommand> for CommandDesk {
    type Output = String;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Chat:Command")]
    async fn process(&self, cmd: ChatCommand) -> Result<String, Infallible> {
        Ok(self.run(cmd).await.unwrap_or_else(CommandError::reply))
    }
}
