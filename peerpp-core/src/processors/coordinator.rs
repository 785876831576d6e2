//! Lock lifecycle coordinator.
//!
//! The only component that books or deletes placeholders on Intra. A
//! placeholder ends in one of three ways, and each of them records the team
//! as expired before touching Intra:
//!
//! - swapped for a real evaluator ([`Coordinator::swap`]),
//! - swept after the retention window ([`Coordinator::sweep_expired`]),
//! - released after a failing evaluation
//!   ([`Coordinator::handle_failed_prior_evaluation`]).
//!
//! A placeholder cancelled by anyone but the coordinator is booked again.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use peerpp_sdk::objects::ScaleTeamHook;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use super::decision::{BookingGate, DecisionEngine};
use super::notifier::{NotificationReport, Notifier};
use crate::chat::ChatApi;
use crate::config::{PlatformConfig, PolicyConfig};
use crate::identity::Identity;
use crate::platform::{Booking, EvaluationLock, PlatformApi, PlatformError};
use crate::registry::{LockRegistry, RegistryError};
use crate::resolver::{ResolveError, UserResolver};

/// Lead time given to a corrector taking over a placeholder.
const SWAP_LEAD_TIME: Duration = Duration::minutes(20);
/// Added to the retention window when booking a placeholder; must exceed the
/// sweep interval so the sweep sees the lock while it is still upcoming.
const PLACEHOLDER_MARGIN: Duration = Duration::days(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    DeletePlaceholder,
    BookCorrector,
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapStage::DeletePlaceholder => write!(f, "deleting the placeholder"),
            SwapStage::BookCorrector => write!(f, "booking the corrector"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The requested transition is already done or owned by someone else.
    #[error("nothing to do: {0}")]
    NothingToDo(String),

    #[error("not eligible: {0}")]
    NotEligible(String),

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// The team is expired but the swap stopped halfway.
    #[error("swap failed while {stage}: {source}")]
    SwapIncomplete {
        stage: SwapStage,
        #[source]
        source: PlatformError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Booked,
    Skipped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    AlreadyExpired,
    Rebooked,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    TeamExpired,
    PlaceholderReleased,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub lock: EvaluationLock,
    pub corrector: Identity,
    pub begin_at: OffsetDateTime,
    pub notified: NotificationReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Placeholders past the retention window.
    pub examined: usize,
    pub expired: usize,
    pub failures: Vec<String>,
}

/// Placeholders waiting for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectQueue {
    pub slug: String,
    pub teams: usize,
    pub oldest: OffsetDateTime,
}

pub struct Coordinator {
    platform: Arc<dyn PlatformApi>,
    registry: Arc<dyn LockRegistry>,
    resolver: Arc<UserResolver>,
    decision: DecisionEngine,
    notifier: Notifier,
    policy: Arc<RwLock<PolicyConfig>>,
    config: PlatformConfig,
}

impl Coordinator {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        chat: Arc<dyn ChatApi>,
        registry: Arc<dyn LockRegistry>,
        config: PlatformConfig,
        policy: Arc<RwLock<PolicyConfig>>,
    ) -> Self {
        Self::with_gate(platform, chat, registry, config, policy, BookingGate::Random)
    }

    pub fn with_gate(
        platform: Arc<dyn PlatformApi>,
        chat: Arc<dyn ChatApi>,
        registry: Arc<dyn LockRegistry>,
        config: PlatformConfig,
        policy: Arc<RwLock<PolicyConfig>>,
        gate: BookingGate,
    ) -> Self {
        let resolver = Arc::new(UserResolver::new(platform.clone(), chat.clone()));
        let decision = DecisionEngine::new(
            platform.clone(),
            resolver.clone(),
            policy.clone(),
            config.bot_user_id,
            gate,
        );
        let notifier = Notifier::new(
            platform.clone(),
            chat,
            resolver.clone(),
            registry.clone(),
        );
        Self {
            platform,
            registry,
            resolver,
            decision,
            notifier,
            policy,
            config,
        }
    }

    pub fn resolver(&self) -> &UserResolver {
        &self.resolver
    }

    pub fn platform(&self) -> &dyn PlatformApi {
        self.platform.as_ref()
    }

    pub fn config(&self) -> PlatformConfig {
        self.config
    }

    pub fn policy(&self) -> &RwLock<PolicyConfig> {
        &self.policy
    }

    /// A new evaluation was created on Intra.
    #[instrument(skip_all, fields(team_id = hook.team.id, scale_team_id = hook.id))]
    pub async fn handle_create(
        &self,
        hook: &ScaleTeamHook,
    ) -> Result<CreateOutcome, CoordinatorError> {
        if self.registry.is_expired(hook.team.id).await? {
            return Ok(CreateOutcome::Skipped(
                "team already had its Peer++ evaluation".into(),
            ));
        }
        let verdict = self.decision.decide(hook).await;
        if !verdict.required {
            info!(reason = %verdict.reason, "No Peer++ evaluation needed");
            return Ok(CreateOutcome::Skipped(verdict.reason.to_string()));
        }

        self.book_placeholder(hook.scale.id, hook.team.id).await?;

        let (slug, days) = {
            let policy = self.policy.read().await;
            (policy.slug_of(hook.project.id), policy.lock_expiration_days)
        };
        let team = self
            .notifier
            .notify_team(
                hook.team.id,
                &format!(
                    "Your {slug} was selected for a Peer++ evaluation. \
                     An experienced evaluator will take over within {days} days."
                ),
            )
            .await;
        let evaluators = self
            .notifier
            .notify_evaluators(&format!(
                "A new Peer++ evaluation is waiting for {slug} ({}). Use /book {slug} to take it.",
                hook.team.name
            ))
            .await;
        info!(
            slug = %slug,
            team_notified = team.delivered,
            evaluators_notified = evaluators.delivered,
            "Booked Peer++ placeholder"
        );
        Ok(CreateOutcome::Booked)
    }

    /// Reserve an evaluation slot under the service account.
    pub async fn book_placeholder(&self, scale_id: i64, team_id: i64) -> Result<(), CoordinatorError> {
        if self
            .platform
            .bot_locks()
            .await?
            .iter()
            .any(|l| l.team_id == team_id)
        {
            return Err(CoordinatorError::NothingToDo(format!(
                "team {team_id} already has a placeholder"
            )));
        }
        let retention = self.policy.read().await.retention();
        let begin_at = OffsetDateTime::now_utc() + retention + PLACEHOLDER_MARGIN;
        self.platform
            .book_evaluation(Booking {
                scale_id,
                team_id,
                corrector_id: self.config.bot_user_id,
                begin_at,
            })
            .await?;
        Ok(())
    }

    /// Hand a placeholder over to a real corrector.
    #[instrument(skip_all, fields(team_id = lock.team_id, corrector = %corrector.login))]
    pub async fn swap(
        &self,
        lock: &EvaluationLock,
        corrector: &Identity,
    ) -> Result<SwapReceipt, CoordinatorError> {
        if !self.registry.expire(lock.team_id).await? {
            return Err(CoordinatorError::NothingToDo(format!(
                "team {} is already expired",
                lock.team_name
            )));
        }
        self.platform
            .delete_evaluation(lock.id)
            .await
            .map_err(|source| CoordinatorError::SwapIncomplete {
                stage: SwapStage::DeletePlaceholder,
                source,
            })?;

        let begin_at = OffsetDateTime::now_utc() + SWAP_LEAD_TIME;
        self.platform
            .book_evaluation(Booking {
                scale_id: lock.scale_id,
                team_id: lock.team_id,
                corrector_id: corrector.platform_id,
                begin_at,
            })
            .await
            .map_err(|source| CoordinatorError::SwapIncomplete {
                stage: SwapStage::BookCorrector,
                source,
            })?;

        let mut receipt = SwapReceipt {
            lock: lock.clone(),
            corrector: corrector.clone(),
            begin_at,
            notified: NotificationReport::default(),
        };
        receipt.notified = self.notify_swap(&receipt).await;
        info!(slug = %lock.project_slug, "Swapped Peer++ placeholder");
        Ok(receipt)
    }

    /// Tell the evaluated team who takes their Peer++ evaluation.
    pub async fn notify_swap(&self, receipt: &SwapReceipt) -> NotificationReport {
        let report = self
            .notifier
            .notify_users(
                &receipt.lock.correcteds,
                &format!(
                    "You will be evaluated by {} on your {}.",
                    receipt.corrector.login, receipt.lock.project_slug
                ),
            )
            .await;
        if !report.failed.is_empty() {
            warn!(failed = ?report.failed, "Some team members were not notified of the swap");
        }
        report
    }

    /// Swap the oldest placeholder of a project for `corrector`.
    pub async fn book_for_project(
        &self,
        corrector: &Identity,
        slug: &str,
    ) -> Result<SwapReceipt, CoordinatorError> {
        let project = self
            .policy
            .read()
            .await
            .project_by_slug(slug)
            .cloned()
            .ok_or_else(|| CoordinatorError::NotEligible(format!("{slug} is not a Peer++ project")))?;

        if !self
            .platform
            .in_group(corrector.platform_id, self.config.evaluator_group_id)
            .await?
        {
            return Err(CoordinatorError::NotEligible(format!(
                "{} is not a Peer++ evaluator",
                corrector.login
            )));
        }
        if !self
            .platform
            .validated_project(corrector.platform_id, project.id)
            .await?
        {
            return Err(CoordinatorError::NotEligible(format!(
                "{} has not validated {}",
                corrector.login, project.slug
            )));
        }

        let locks = self.platform.bot_locks().await?;
        let lock = locks
            .iter()
            .filter(|l| l.project_id == project.id && !l.is_corrected(corrector.platform_id))
            .min_by_key(|l| l.created_at)
            .ok_or_else(|| {
                CoordinatorError::NothingToDo(format!("no team is waiting for {}", project.slug))
            })?;
        self.swap(lock, corrector).await
    }

    /// An evaluation was deleted on Intra.
    pub async fn handle_delete(
        &self,
        hook: &ScaleTeamHook,
    ) -> Result<CancelOutcome, CoordinatorError> {
        if hook.evaluator_id() != Some(self.config.bot_user_id) {
            return Ok(CancelOutcome::Ignored);
        }
        self.handle_cancelled_placeholder(hook.team.id, hook.scale.id)
            .await
    }

    /// A placeholder disappeared without the coordinator deleting it.
    #[instrument(skip(self))]
    pub async fn handle_cancelled_placeholder(
        &self,
        team_id: i64,
        scale_id: i64,
    ) -> Result<CancelOutcome, CoordinatorError> {
        if self.registry.is_expired(team_id).await? {
            return Ok(CancelOutcome::AlreadyExpired);
        }
        match self.book_placeholder(scale_id, team_id).await {
            Ok(()) => {}
            Err(CoordinatorError::NothingToDo(reason)) => {
                info!(%reason, "Cancelled placeholder still present");
                return Ok(CancelOutcome::Ignored);
            }
            Err(e) => return Err(e),
        }
        self.notifier
            .notify_team(team_id, "Nice try! You can't cancel Peer++ evaluations.")
            .await;
        info!("Re-booked cancelled placeholder");
        Ok(CancelOutcome::Rebooked)
    }

    /// Release every placeholder older than the retention window.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, retention_days: u32) -> Result<SweepReport, CoordinatorError> {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(i64::from(retention_days));
        let mut report = SweepReport::default();
        for lock in self.platform.bot_locks().await? {
            if lock.created_at >= cutoff {
                continue;
            }
            report.examined += 1;
            if let Err(e) = self.registry.expire(lock.team_id).await {
                warn!(team_id = lock.team_id, error = %e, "Failed to record expired team");
                report.failures.push(format!("{}: {e}", lock.team_name));
                continue;
            }
            if let Err(e) = self.platform.delete_evaluation(lock.id).await {
                warn!(scale_team_id = lock.id, error = %e, "Failed to delete stale placeholder");
                report.failures.push(format!("{}: {e}", lock.team_name));
                continue;
            }
            report.expired += 1;
        }
        if report.examined > 0 {
            info!(
                examined = report.examined,
                expired = report.expired,
                failures = report.failures.len(),
                "Swept stale placeholders"
            );
        }
        Ok(report)
    }

    /// A prior evaluation of the team failed; its placeholder is pointless.
    ///
    /// Returns whether a placeholder was released.
    pub async fn handle_failed_prior_evaluation(
        &self,
        team_id: i64,
        lock_id: Option<i64>,
        passed: bool,
    ) -> Result<bool, CoordinatorError> {
        let Some(lock_id) = lock_id else {
            return Ok(false);
        };
        if passed {
            return Ok(false);
        }
        self.registry.expire(team_id).await?;
        self.platform.delete_evaluation(lock_id).await?;
        info!(team_id, scale_team_id = lock_id, "Released placeholder after failing evaluation");
        Ok(true)
    }

    /// An evaluation changed on Intra, usually because it was marked.
    #[instrument(skip_all, fields(team_id = hook.team.id, scale_team_id = hook.id))]
    pub async fn handle_update(
        &self,
        hook: &ScaleTeamHook,
    ) -> Result<UpdateOutcome, CoordinatorError> {
        if hook.evaluator_id() == Some(self.config.bot_user_id) {
            if !hook.is_truant() {
                return Ok(UpdateOutcome::Ignored);
            }
            self.registry.expire(hook.team.id).await?;
            info!("Placeholder flagged truant, team expired");
            return Ok(UpdateOutcome::TeamExpired);
        }

        let Some(mark) = hook.final_mark else {
            return Ok(UpdateOutcome::Ignored);
        };
        let lock_id = self
            .platform
            .bot_locks()
            .await?
            .into_iter()
            .find(|l| l.team_id == hook.team.id)
            .map(|l| l.id);
        if lock_id.is_none() {
            return Ok(UpdateOutcome::Ignored);
        }
        let passed = self.platform.mark_is_pass(hook.project.id, mark).await?;
        if self
            .handle_failed_prior_evaluation(hook.team.id, lock_id, passed)
            .await?
        {
            Ok(UpdateOutcome::PlaceholderReleased)
        } else {
            Ok(UpdateOutcome::Ignored)
        }
    }

    /// Waiting placeholders per project, oldest first.
    pub async fn list_locks(&self) -> Result<Vec<ProjectQueue>, CoordinatorError> {
        let locks = self.platform.bot_locks().await?;
        let queues = locks
            .into_iter()
            .into_group_map_by(|l| l.project_slug.clone())
            .into_iter()
            .filter_map(|(slug, locks)| {
                let oldest = locks.iter().map(|l| l.created_at).min()?;
                Some(ProjectQueue {
                    slug,
                    teams: locks.len(),
                    oldest,
                })
            })
            .sorted_by_key(|q| q.oldest)
            .collect();
        Ok(queues)
    }

    pub async fn set_notify(&self, chat_id: &str, enabled: bool) -> Result<(), CoordinatorError> {
        self.registry.set_notify(chat_id, enabled).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{self, Admission, DeliveryHeaders};
    use crate::identity::IncompleteIdentity;
    use crate::processors::scheduler::SWEEP_INTERVAL;
    use crate::registry::MemoryLockRegistry;
    use crate::testing::{
        BOT_ID, Call, EVALUATOR_GROUP, FakeChat, FakePlatform, LIBFT, PRINTF, hook,
        platform_config, policy,
    };
    use peerpp_sdk::objects::webhook::{HookUser, Truant};

    struct Fixture {
        platform: Arc<FakePlatform>,
        chat: Arc<FakeChat>,
        registry: Arc<MemoryLockRegistry>,
        coordinator: Coordinator,
    }

    /// Team 9 (leader jdoe, level 4) on libft, two correctors and a senior.
    fn fixture(gate: BookingGate) -> Fixture {
        let platform = Arc::new(FakePlatform::default());
        platform.add_user(5, "jdoe", 4.0);
        platform.add_user(6, "first", 5.0);
        platform.add_user(7, "second", 3.0);
        platform.add_user(8, "senior", 6.0);
        platform.add_team(9, LIBFT, &[5]);
        platform.join_group(8, EVALUATOR_GROUP);
        platform.validate(8, LIBFT);
        let chat = Arc::new(FakeChat::default());
        let registry = Arc::new(MemoryLockRegistry::new());
        let coordinator = Coordinator::with_gate(
            platform.clone(),
            chat.clone(),
            registry.clone(),
            platform_config(),
            policy(100),
            gate,
        );
        Fixture {
            platform,
            chat,
            registry,
            coordinator,
        }
    }

    fn days_ago(days: i64) -> OffsetDateTime {
        OffsetDateTime::now_utc() - Duration::days(days)
    }

    /// First evaluation done by `first` with 100, second just booked.
    fn second_to_last(f: &Fixture) {
        f.platform.insert_evaluation(3, 9, 6, Some(100), days_ago(1));
        f.platform
            .insert_evaluation(3, 9, 7, None, OffsetDateTime::now_utc());
    }

    async fn senior(f: &Fixture) -> Identity {
        f.coordinator
            .resolver()
            .resolve(IncompleteIdentity::from_login("senior"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn libft_scenario_books_then_swaps() {
        let f = fixture(BookingGate::Always);
        second_to_last(&f);
        f.registry.set_notify("U-senior", true).await.unwrap();

        let outcome = f
            .coordinator
            .handle_create(&hook(Some((7, "second")), LIBFT))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Booked);
        assert_eq!(f.platform.placeholders_of(9), 1);
        assert_eq!(f.chat.sent_to("U-jdoe").len(), 1);
        assert_eq!(f.chat.sent_to("U-senior").len(), 1);

        let corrector = senior(&f).await;
        let receipt = f
            .coordinator
            .book_for_project(&corrector, "libft")
            .await
            .unwrap();
        assert_eq!(receipt.lock.team_id, 9);
        assert_eq!(receipt.notified.delivered, 1);
        assert_eq!(f.platform.placeholders_of(9), 0);
        assert!(f.registry.is_expired(9).await.unwrap());

        let calls = f.platform.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[1], Call::Delete(id) if *id == receipt.lock.id));
        assert!(matches!(&calls[2], Call::Book(b) if b.corrector_id == 8 && b.team_id == 9));
        assert_eq!(
            f.chat.sent_to("U-jdoe").last().map(String::as_str),
            Some("You will be evaluated by senior on your libft.")
        );
    }

    #[tokio::test]
    async fn repeated_creates_keep_at_most_one_placeholder() {
        let f = fixture(BookingGate::Always);
        second_to_last(&f);
        let create = hook(Some((7, "second")), LIBFT);

        f.coordinator.handle_create(&create).await.unwrap();
        for _ in 0..3 {
            let outcome = f.coordinator.handle_create(&create).await.unwrap();
            assert!(matches!(outcome, CreateOutcome::Skipped(_)));
            assert_eq!(f.platform.placeholders_of(9), 1);
        }

        // A different scale of the same team still must not get a second one.
        let err = f.coordinator.book_placeholder(4, 9).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::NothingToDo(_)));
        assert_eq!(f.platform.placeholders_of(9), 1);
    }

    #[tokio::test]
    async fn expired_team_is_never_rebooked() {
        let f = fixture(BookingGate::Always);
        second_to_last(&f);
        f.registry.expire(9).await.unwrap();

        let create = f
            .coordinator
            .handle_create(&hook(Some((7, "second")), LIBFT))
            .await
            .unwrap();
        assert!(matches!(create, CreateOutcome::Skipped(_)));

        let cancel = f
            .coordinator
            .handle_cancelled_placeholder(9, 3)
            .await
            .unwrap();
        assert_eq!(cancel, CancelOutcome::AlreadyExpired);
        assert!(f.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn swap_of_expired_team_is_nothing_to_do() {
        let f = fixture(BookingGate::Always);
        let id = f
            .platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(2));
        let lock = f
            .platform
            .locks()
            .into_iter()
            .find(|l| l.id == id)
            .unwrap();
        let corrector = senior(&f).await;

        f.coordinator.swap(&lock, &corrector).await.unwrap();
        let again = f.coordinator.swap(&lock, &corrector).await.unwrap_err();
        assert!(matches!(again, CoordinatorError::NothingToDo(_)));
        assert_eq!(
            f.platform
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Delete(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failed_delete_keeps_team_expired() {
        let f = fixture(BookingGate::Always);
        let id = f
            .platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(2));
        let lock = f
            .platform
            .locks()
            .into_iter()
            .find(|l| l.id == id)
            .unwrap();
        let corrector = senior(&f).await;
        f.platform.fail_deletes();

        let err = f.coordinator.swap(&lock, &corrector).await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::SwapIncomplete {
                stage: SwapStage::DeletePlaceholder,
                ..
            }
        ));
        assert!(f.registry.is_expired(9).await.unwrap());
    }

    #[tokio::test]
    async fn swap_survives_notification_failures() {
        let f = fixture(BookingGate::Always);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(2));
        let corrector = senior(&f).await;
        f.chat.fail_sends();

        let receipt = f
            .coordinator
            .book_for_project(&corrector, "libft")
            .await
            .unwrap();
        assert_eq!(receipt.notified.delivered, 0);
        assert_eq!(receipt.notified.failed.len(), 1);
    }

    #[tokio::test]
    async fn book_for_project_checks_eligibility() {
        let f = fixture(BookingGate::Always);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(2));

        let jdoe = f
            .coordinator
            .resolver()
            .resolve(IncompleteIdentity::from_login("jdoe"))
            .await
            .unwrap();
        let err = f
            .coordinator
            .book_for_project(&jdoe, "libft")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotEligible(_)));

        // An evaluator never takes over their own team.
        f.platform.join_group(5, EVALUATOR_GROUP);
        f.platform.validate(5, LIBFT);
        let err = f
            .coordinator
            .book_for_project(&jdoe, "libft")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NothingToDo(_)));

        let corrector = senior(&f).await;
        let err = f
            .coordinator
            .book_for_project(&corrector, "minishell")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::NotEligible(_)));
    }

    #[tokio::test]
    async fn book_for_project_takes_the_oldest_placeholder() {
        let f = fixture(BookingGate::Always);
        f.platform.add_user(10, "alice", 2.0);
        f.platform.add_team(11, LIBFT, &[10]);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(1));
        f.platform
            .insert_evaluation(3, 11, BOT_ID, None, days_ago(5));

        let corrector = senior(&f).await;
        let receipt = f
            .coordinator
            .book_for_project(&corrector, "LIBFT")
            .await
            .unwrap();
        assert_eq!(receipt.lock.team_id, 11);
    }

    #[tokio::test]
    async fn redelivered_create_books_once() {
        let f = fixture(BookingGate::Always);
        second_to_last(&f);
        let create = hook(Some((7, "second")), LIBFT);
        let delivery = DeliveryHeaders {
            content_type: Some("application/json"),
            delivery_id: Some("c0ffee-1"),
            secret: Some("create-secret"),
        };

        let mut admissions = Vec::new();
        for _ in 0..2 {
            let admission = admission::admit(delivery, "create-secret", f.registry.as_ref())
                .await
                .unwrap();
            if matches!(admission, Admission::Admitted { .. }) {
                let outcome = f.coordinator.handle_create(&create).await.unwrap();
                assert_eq!(outcome, CreateOutcome::Booked);
            }
            admissions.push(admission);
        }

        assert!(matches!(admissions[0], Admission::Admitted { .. }));
        assert_eq!(admissions[1], Admission::Duplicate);
        let bookings = f
            .platform
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Book(_)))
            .count();
        assert_eq!(bookings, 1);
        assert_eq!(f.chat.sent_to("U-jdoe").len(), 1);
        assert_eq!(f.platform.placeholders_of(9), 1);
    }

    #[tokio::test]
    async fn delete_without_evaluator_is_ignored() {
        let f = fixture(BookingGate::Always);
        let unwatched = 42;

        let outcome = f
            .coordinator
            .handle_delete(&hook(None, unwatched))
            .await
            .unwrap();
        assert_eq!(outcome, CancelOutcome::Ignored);
        assert!(f.platform.calls().is_empty());
        assert_eq!(f.platform.placeholders_of(9), 0);
        assert!(f.chat.sent().is_empty());
    }

    #[tokio::test]
    async fn placeholder_is_still_upcoming_when_the_sweep_reaches_it() {
        let f = fixture(BookingGate::Always);
        let booked_at = OffsetDateTime::now_utc();
        f.coordinator.book_placeholder(3, 9).await.unwrap();
        let lead = match f.platform.calls().as_slice() {
            [Call::Book(booking)] => booking.begin_at - booked_at,
            other => panic!("unexpected calls: {other:?}"),
        };
        let interval = Duration::try_from(SWEEP_INTERVAL).unwrap();
        assert!(lead > Duration::days(14) + interval);

        // The same lead, one sweep interval past the cutoff.
        f.platform.add_team(11, LIBFT, &[6]);
        let created_at = days_ago(14) - interval;
        f.platform
            .insert_evaluation_at(3, 11, BOT_ID, created_at, created_at + lead);

        let report = f.coordinator.sweep_expired(14).await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(f.platform.placeholders_of(11), 0);
        assert_eq!(f.platform.placeholders_of(9), 1);
        assert!(f.registry.is_expired(11).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_cannot_see_placeholders_that_already_began() {
        let f = fixture(BookingGate::Always);
        let created_at = days_ago(15);
        f.platform
            .insert_evaluation_at(3, 9, BOT_ID, created_at, days_ago(1));

        let report = f.coordinator.sweep_expired(14).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(f.platform.placeholders_of(9), 1);
    }

    #[tokio::test]
    async fn cancelled_placeholder_is_rebooked() {
        let f = fixture(BookingGate::Always);
        let mut cancel = hook(None, LIBFT);
        cancel.user = Some(HookUser {
            id: BOT_ID,
            login: "peerpp".into(),
        });

        let outcome = f.coordinator.handle_delete(&cancel).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Rebooked);
        assert_eq!(f.platform.placeholders_of(9), 1);
        assert_eq!(
            f.chat.sent_to("U-jdoe"),
            vec!["Nice try! You can't cancel Peer++ evaluations."]
        );

        let other = hook(Some((7, "second")), LIBFT);
        assert_eq!(
            f.coordinator.handle_delete(&other).await.unwrap(),
            CancelOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn sweep_releases_only_stale_placeholders() {
        let f = fixture(BookingGate::Always);
        f.platform.add_team(11, PRINTF, &[6]);
        f.platform.add_team(12, LIBFT, &[7]);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(20));
        f.platform
            .insert_evaluation(4, 11, BOT_ID, None, days_ago(15));
        f.platform
            .insert_evaluation(3, 12, BOT_ID, None, days_ago(2));
        // Already expired teams are swept again without complaint.
        f.registry.expire(11).await.unwrap();

        let report = f.coordinator.sweep_expired(14).await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.expired, 2);
        assert!(report.failures.is_empty());
        assert_eq!(f.platform.placeholders_of(12), 1);
        assert!(f.registry.is_expired(9).await.unwrap());
        assert!(!f.registry.is_expired(12).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_reports_failures_and_keeps_going() {
        let f = fixture(BookingGate::Always);
        f.platform.add_team(11, LIBFT, &[6]);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(20));
        f.platform
            .insert_evaluation(3, 11, BOT_ID, None, days_ago(20));
        f.platform.fail_deletes();

        let report = f.coordinator.sweep_expired(14).await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.expired, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(f.registry.expired_count(), 2);
    }

    #[tokio::test]
    async fn failing_mark_releases_the_placeholder() {
        let f = fixture(BookingGate::Always);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(1));
        let mut update = hook(Some((7, "second")), LIBFT);
        update.final_mark = Some(60);
        assert_eq!(
            f.coordinator.handle_update(&update).await.unwrap(),
            UpdateOutcome::Ignored
        );
        assert_eq!(f.platform.placeholders_of(9), 1);

        update.final_mark = Some(30);
        assert_eq!(
            f.coordinator.handle_update(&update).await.unwrap(),
            UpdateOutcome::PlaceholderReleased
        );
        assert_eq!(f.platform.placeholders_of(9), 0);
        assert!(f.registry.is_expired(9).await.unwrap());
    }

    #[tokio::test]
    async fn truant_placeholder_expires_the_team() {
        let f = fixture(BookingGate::Always);
        let mut update = hook(Some((BOT_ID, "peerpp")), LIBFT);
        assert_eq!(
            f.coordinator.handle_update(&update).await.unwrap(),
            UpdateOutcome::Ignored
        );
        update.truant = Some(Truant { id: Some(5) });
        assert_eq!(
            f.coordinator.handle_update(&update).await.unwrap(),
            UpdateOutcome::TeamExpired
        );
        assert!(f.registry.is_expired(9).await.unwrap());
        assert!(f.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn locks_are_grouped_per_project_oldest_first() {
        let f = fixture(BookingGate::Always);
        f.platform.add_team(11, PRINTF, &[6]);
        f.platform.add_team(12, LIBFT, &[7]);
        f.platform
            .insert_evaluation(3, 9, BOT_ID, None, days_ago(3));
        f.platform
            .insert_evaluation(4, 11, BOT_ID, None, days_ago(8));
        f.platform
            .insert_evaluation(3, 12, BOT_ID, None, days_ago(1));
        f.platform
            .insert_evaluation(3, 12, 6, Some(100), days_ago(9));

        let queues = f.coordinator.list_locks().await.unwrap();
        let summary: Vec<_> = queues
            .iter()
            .map(|q| (q.slug.as_str(), q.teams))
            .collect();
        assert_eq!(summary, vec![("ft_printf", 1), ("libft", 2)]);
    }
}
