//! Whether a newly created evaluation calls for a Peer++ placeholder.
//!
//! Checks run in order and stop at the first one that settles the
//! question. Lookup failures never book: the delivery is answered as
//! "not required" and the error is logged.

use std::fmt;
use std::sync::Arc;

use peerpp_sdk::objects::ScaleTeamHook;
use rand::Rng;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::config::PolicyConfig;
use crate::identity::IncompleteIdentity;
use crate::platform::{PlatformApi, PlatformError};
use crate::resolver::{ResolveError, UserResolver};

/// A corrector this many levels above the team leader is trusted.
const LEVEL_MARGIN: f64 = 2.0;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("team {0} has no leader")]
    NoLeader(i64),
}

/// Final chance gate on a required evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingGate {
    /// Book with `random_booking_chance` percent probability.
    Random,
    Always,
    Never,
}

impl BookingGate {
    fn admits(self, chance: u8) -> bool {
        match self {
            BookingGate::Random => rand::rng().random_range(0..100u8) < chance,
            BookingGate::Always => true,
            BookingGate::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerdictReason {
    NoEvaluator,
    EvaluatorIsBot,
    ProjectNotWatched(i64),
    NotSecondToLast { count: i64, expected: i64 },
    BotAlreadyPresent,
    PriorEvaluationFailed { mark: i64 },
    HighLevelCorrector { login: String },
    CorrectorValidatedProject { login: String },
    LookupFailed(String),
    RandomSkip,
    Required,
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictReason::NoEvaluator => write!(f, "evaluation has no evaluator"),
            VerdictReason::EvaluatorIsBot => write!(f, "evaluator is the service account"),
            VerdictReason::ProjectNotWatched(id) => write!(f, "project {id} is not watched"),
            VerdictReason::NotSecondToLast { count, expected } => {
                write!(f, "{count} evaluations booked, Peer++ waits for {expected}")
            }
            VerdictReason::BotAlreadyPresent => write!(f, "a Peer++ evaluation is already booked"),
            VerdictReason::PriorEvaluationFailed { mark } => {
                write!(f, "a prior evaluation failed with {mark}")
            }
            VerdictReason::HighLevelCorrector { login } => {
                write!(f, "{login} is an experienced corrector")
            }
            VerdictReason::CorrectorValidatedProject { login } => {
                write!(f, "{login} validated the project")
            }
            VerdictReason::LookupFailed(e) => write!(f, "lookup failed: {e}"),
            VerdictReason::RandomSkip => write!(f, "skipped by random selection"),
            VerdictReason::Required => write!(f, "Peer++ evaluation required"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub required: bool,
    pub reason: VerdictReason,
}

impl Verdict {
    fn skip(reason: VerdictReason) -> Self {
        Self {
            required: false,
            reason,
        }
    }
}

pub struct DecisionEngine {
    platform: Arc<dyn PlatformApi>,
    resolver: Arc<UserResolver>,
    policy: Arc<RwLock<PolicyConfig>>,
    bot_user_id: i64,
    gate: BookingGate,
}

impl DecisionEngine {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        resolver: Arc<UserResolver>,
        policy: Arc<RwLock<PolicyConfig>>,
        bot_user_id: i64,
        gate: BookingGate,
    ) -> Self {
        Self {
            platform,
            resolver,
            policy,
            bot_user_id,
            gate,
        }
    }

    pub async fn decide(&self, hook: &ScaleTeamHook) -> Verdict {
        let Some(evaluator) = &hook.user else {
            return Verdict::skip(VerdictReason::NoEvaluator);
        };
        if evaluator.id == self.bot_user_id {
            return Verdict::skip(VerdictReason::EvaluatorIsBot);
        }
        let chance = {
            let policy = self.policy.read().await;
            if policy.project(hook.project.id).is_none() {
                return Verdict::skip(VerdictReason::ProjectNotWatched(hook.project.id));
            }
            policy.random_booking_chance
        };

        match self.check_history(hook).await {
            Ok(Some(reason)) => return Verdict::skip(reason),
            Ok(None) => {}
            Err(e) => {
                error!(
                    scale_team_id = hook.id,
                    team_id = hook.team.id,
                    error = %e,
                    "Failed to evaluate Peer++ requirement"
                );
                return Verdict::skip(VerdictReason::LookupFailed(e.to_string()));
            }
        }

        if !self.gate.admits(chance) {
            return Verdict::skip(VerdictReason::RandomSkip);
        }
        Verdict {
            required: true,
            reason: VerdictReason::Required,
        }
    }

    /// Checks against the team's evaluation history. `None` means no check
    /// objected.
    async fn check_history(
        &self,
        hook: &ScaleTeamHook,
    ) -> Result<Option<VerdictReason>, DecisionError> {
        let project_id = hook.project.id;
        let evaluations = self
            .platform
            .evaluations(project_id, hook.scale.id, hook.team.id)
            .await?;

        let count = evaluations.len() as i64;
        let expected = hook.scale.correction_number - 1;
        if count != expected {
            return Ok(Some(VerdictReason::NotSecondToLast { count, expected }));
        }
        if evaluations
            .iter()
            .any(|e| e.corrector_id() == Some(self.bot_user_id))
        {
            return Ok(Some(VerdictReason::BotAlreadyPresent));
        }

        let finished: Vec<_> = evaluations
            .iter()
            .filter_map(|e| e.final_mark.map(|mark| (e, mark)))
            .collect();
        if finished.is_empty() {
            return Ok(None);
        }

        let minimum = self.platform.minimum_mark(project_id).await?;
        if let Some((_, mark)) = finished.iter().find(|(_, mark)| *mark < minimum) {
            return Ok(Some(VerdictReason::PriorEvaluationFailed { mark: *mark }));
        }

        let leader_id = self
            .platform
            .team_users(hook.team.id)
            .await?
            .into_iter()
            .find(|m| m.leader)
            .map(|m| m.user_id)
            .ok_or(DecisionError::NoLeader(hook.team.id))?;
        let leader = self
            .resolver
            .resolve(IncompleteIdentity::from_platform_id(leader_id))
            .await?;

        for corrector in finished.iter().filter_map(|(e, _)| e.corrector.as_ref()) {
            let corrector = self.resolver.resolve(corrector.into()).await?;
            if corrector.level >= leader.level + LEVEL_MARGIN {
                return Ok(Some(VerdictReason::HighLevelCorrector {
                    login: corrector.login,
                }));
            }
            if self
                .platform
                .validated_project(corrector.platform_id, project_id)
                .await?
            {
                return Ok(Some(VerdictReason::CorrectorValidatedProject {
                    login: corrector.login,
                }));
            }
        }
        debug!(
            team_id = hook.team.id,
            leader = %leader.login,
            "No prior corrector settles the evaluation"
        );
        Ok(None)
    }
}
