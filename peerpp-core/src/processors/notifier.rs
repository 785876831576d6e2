//! Chat notification fan-out.
//!
//! Fan-out never fails as a whole: each recipient is tried independently
//! and the outcome is summarised in a [`NotificationReport`].

use std::sync::Arc;

use peerpp_sdk::objects::UserRef;
use tracing::{debug, warn};

use crate::chat::ChatApi;
use crate::identity::IncompleteIdentity;
use crate::platform::PlatformApi;
use crate::registry::LockRegistry;
use crate::resolver::UserResolver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
    pub delivered: usize,
    /// Recipients that could not be reached, with the reason.
    pub failed: Vec<String>,
}

impl NotificationReport {
    fn fail(&mut self, recipient: impl std::fmt::Display, reason: impl std::fmt::Display) {
        self.failed.push(format!("{recipient}: {reason}"));
    }
}

pub struct Notifier {
    platform: Arc<dyn PlatformApi>,
    chat: Arc<dyn ChatApi>,
    resolver: Arc<UserResolver>,
    registry: Arc<dyn LockRegistry>,
}

impl Notifier {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        chat: Arc<dyn ChatApi>,
        resolver: Arc<UserResolver>,
        registry: Arc<dyn LockRegistry>,
    ) -> Self {
        Self {
            platform,
            chat,
            resolver,
            registry,
        }
    }

    /// Message every member of a team.
    pub async fn notify_team(&self, team_id: i64, text: &str) -> NotificationReport {
        let members = match self.platform.team_users(team_id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(team_id, error = %e, "Failed to list team members for notification");
                let mut report = NotificationReport::default();
                report.fail(format!("team {team_id}"), e);
                return report;
            }
        };
        let mut report = NotificationReport::default();
        for member in members {
            self.send_to(
                IncompleteIdentity::from_platform_id(member.user_id),
                member.user_id,
                text,
                &mut report,
            )
            .await;
        }
        report
    }

    pub async fn notify_users(&self, users: &[UserRef], text: &str) -> NotificationReport {
        let mut report = NotificationReport::default();
        for user in users {
            self.send_to(user.into(), &user.login, text, &mut report)
                .await;
        }
        report
    }

    /// Message every evaluator who opted in to new-lock notifications.
    pub async fn notify_evaluators(&self, text: &str) -> NotificationReport {
        let mut report = NotificationReport::default();
        let targets = match self.registry.notify_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "Failed to load notification preferences");
                report.fail("evaluators", e);
                return report;
            }
        };
        for chat_id in targets {
            match self.chat.send_message(&chat_id, text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => report.fail(&chat_id, e),
            }
        }
        report
    }

    async fn send_to(
        &self,
        who: IncompleteIdentity,
        label: impl std::fmt::Display,
        text: &str,
        report: &mut NotificationReport,
    ) {
        let identity = match self.resolver.resolve(who).await {
            Ok(identity) => identity,
            Err(e) => {
                debug!(recipient = %label, error = %e, "Cannot notify unresolvable user");
                report.fail(label, e);
                return;
            }
        };
        match self.chat.send_message(&identity.chat_id, text).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(login = %identity.login, error = %e, "Failed to send chat message");
                report.fail(&identity.login, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryLockRegistry;
    use crate::testing::{FakeChat, FakePlatform, LIBFT};

    fn notifier(platform: Arc<FakePlatform>, chat: Arc<FakeChat>) -> (Notifier, Arc<MemoryLockRegistry>) {
        let registry = Arc::new(MemoryLockRegistry::new());
        let resolver = Arc::new(UserResolver::new(platform.clone(), chat.clone()));
        (
            Notifier::new(platform, chat, resolver, registry.clone()),
            registry,
        )
    }

    #[tokio::test]
    async fn team_fan_out_reports_unreachable_members() {
        let platform = Arc::new(FakePlatform::default());
        platform.add_user(5, "jdoe", 4.0);
        platform.add_user(6, "ghost", 4.0);
        platform.add_team(9, LIBFT, &[5, 6]);
        let chat = Arc::new(FakeChat::default());
        chat.remove_member("ghost@student.codam.nl");
        let (notifier, _) = notifier(platform, chat.clone());

        let report = notifier.notify_team(9, "hello").await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].starts_with("6:"));
        assert_eq!(chat.sent_to("U-jdoe"), vec!["hello"]);
    }

    #[tokio::test]
    async fn only_opted_in_evaluators_are_told() {
        let platform = Arc::new(FakePlatform::default());
        let chat = Arc::new(FakeChat::default());
        let (notifier, registry) = notifier(platform, chat.clone());
        registry.set_notify("U-a", true).await.unwrap();
        registry.set_notify("U-b", false).await.unwrap();

        let report = notifier.notify_evaluators("new lock").await;
        assert_eq!(report.delivered, 1);
        assert_eq!(chat.sent(), vec![("U-a".to_owned(), "new lock".to_owned())]);
    }
}
