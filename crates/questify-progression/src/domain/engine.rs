//! The progression engine: folds quiz results into a player.
//!
//! Every operation stages its events on a clone of the player and swaps the
//! clone in only when all steps succeeded, so a rejected call leaves the
//! player and its pending events exactly as they were.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use questify_core::clock::Clock;
use questify_core::error::DomainError;
use questify_quiz::domain::session::{AnswerOutcome, SessionSummary};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::aggregates::Player;
use super::badges::{Badge, BadgeCatalog};
use super::events::{
    AnswerRecorded, BadgeEarned, LevelReached, ProgressionEventKind, QuizCompleted, StreakUpdated,
};
use super::leaderboard::{Leaderboard, PlayerSnapshot};
use super::level::{LevelCurve, LevelProgress};
use super::streak::StreakDelta;

/// Default upper bound for an answer to count as fast, in seconds.
pub const DEFAULT_FAST_ANSWER_SECS: i64 = 10;

/// Tunable inputs of the engine, supplied by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionRules {
    pub curve: LevelCurve,
    pub badges: BadgeCatalog,
    /// A correct, not timed-out answer at or under this is fast.
    pub fast_answer_threshold: TimeDelta,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            curve: LevelCurve::default(),
            badges: BadgeCatalog::default(),
            fast_answer_threshold: TimeDelta::seconds(DEFAULT_FAST_ANSWER_SECS),
        }
    }
}

/// What a single engine call changed, for the host to surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionResult {
    pub xp_gained: u64,
    pub leveled_up: bool,
    /// Set only when `leveled_up`.
    pub new_level: Option<u32>,
    /// Level progress after the call.
    pub level: LevelProgress,
    /// Set when the call recorded a new activity day.
    pub streak_delta: Option<StreakDelta>,
    pub newly_earned_badges: Vec<Badge>,
}

impl ProgressionResult {
    fn empty(level: LevelProgress) -> Self {
        Self {
            xp_gained: 0,
            leveled_up: false,
            new_level: None,
            level,
            streak_delta: None,
            newly_earned_badges: Vec::new(),
        }
    }
}

/// Stateless orchestrator over a set of `ProgressionRules`.
#[derive(Debug, Clone, Default)]
pub struct ProgressionEngine {
    rules: ProgressionRules,
}

impl ProgressionEngine {
    #[must_use]
    pub fn new(rules: ProgressionRules) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &ProgressionRules {
        &self.rules
    }

    /// Level and progress for `xp`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `xp` is negative.
    pub fn level_for(&self, xp: i64) -> Result<LevelProgress, DomainError> {
        self.rules.curve.level_for(xp)
    }

    /// Ranks player snapshots.
    #[must_use]
    pub fn rank(&self, snapshots: Vec<PlayerSnapshot>) -> Leaderboard {
        Leaderboard::rank(snapshots)
    }

    /// Folds one answer into the player: XP, level, streak, then badges.
    ///
    /// The streak is touched only when `activity_date` differs from the
    /// player's last activity, i.e. on the first answer of a day.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for an inconsistent outcome,
    /// `DomainError::OutOfOrderActivity` for a date before the last activity,
    /// and `DomainError::InvalidStateTransition` for an unregistered player.
    pub fn apply_answer_outcome(
        &self,
        player: &mut Player,
        outcome: &AnswerOutcome,
        activity_date: NaiveDate,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<ProgressionResult, DomainError> {
        ensure_registered(player, "apply an answer outcome")?;
        let at = clock.now();
        let mut staged = player.clone();
        let mut result = ProgressionResult::empty(staged.level(&self.rules.curve));

        self.fold_answer(&mut staged, outcome, activity_date, correlation_id, at, &mut result)?;

        result.level = staged.level(&self.rules.curve);
        *player = staged;
        Ok(result)
    }

    /// Commits a finished session: every outcome in order, then the quiz
    /// completion, then a final badge pass.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the summary belongs to another
    /// player or is internally inconsistent, and
    /// `DomainError::InvalidStateTransition` if it was already committed.
    /// Errors from folding individual outcomes propagate unchanged.
    pub fn commit_session(
        &self,
        player: &mut Player,
        summary: &SessionSummary,
        activity_date: NaiveDate,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<ProgressionResult, DomainError> {
        ensure_registered(player, "commit a session")?;
        if summary.player_id != player.id {
            return Err(DomainError::InvalidArgument(format!(
                "session {} belongs to player {}, not {}",
                summary.session_id, summary.player_id, player.id
            )));
        }
        if player.has_committed(summary.session_id) {
            return Err(DomainError::invalid_transition(
                format!("session {} is committed", summary.session_id),
                "commit a session",
            ));
        }
        let answered = u32::try_from(summary.outcomes.len()).unwrap_or(u32::MAX);
        if answered != summary.total_questions || summary.total_questions == 0 {
            return Err(DomainError::InvalidArgument(format!(
                "session {} has {answered} outcomes for {} questions",
                summary.session_id, summary.total_questions
            )));
        }
        let correct = u32::try_from(summary.outcomes.iter().filter(|o| o.is_correct).count())
            .unwrap_or(u32::MAX);
        let xp: u64 = summary.outcomes.iter().map(|o| u64::from(o.xp_awarded)).sum();
        if correct != summary.correct_count || xp != summary.total_xp {
            return Err(DomainError::InvalidArgument(format!(
                "session {} reports {} correct for {} XP, outcomes give {correct} for {xp} XP",
                summary.session_id, summary.correct_count, summary.total_xp
            )));
        }

        let at = clock.now();
        let mut staged = player.clone();
        let mut result = ProgressionResult::empty(staged.level(&self.rules.curve));

        for outcome in &summary.outcomes {
            self.fold_answer(&mut staged, outcome, activity_date, correlation_id, at, &mut result)?;
        }
        staged.record(
            ProgressionEventKind::QuizCompleted(QuizCompleted {
                player_id: staged.id,
                session_id: summary.session_id,
                quiz_id: summary.quiz_id.clone(),
                subject: summary.subject.clone(),
                correct_count: summary.correct_count,
                total_questions: summary.total_questions,
                total_xp: summary.total_xp,
                perfect: summary.is_perfect(),
            }),
            correlation_id,
            at,
        );
        self.unlock_badges(&mut staged, correlation_id, at, &mut result);

        result.level = staged.level(&self.rules.curve);
        debug!(
            player_id = %staged.id,
            session_id = %summary.session_id,
            xp_gained = result.xp_gained,
            "session committed"
        );
        *player = staged;
        Ok(result)
    }

    /// Records a day of activity, then re-evaluates badges.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfOrderActivity` for a date before the last
    /// activity and `DomainError::InvalidStateTransition` for an unregistered
    /// player.
    pub fn record_activity(
        &self,
        player: &mut Player,
        activity_date: NaiveDate,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<ProgressionResult, DomainError> {
        ensure_registered(player, "record activity")?;
        let at = clock.now();
        let mut staged = player.clone();
        let mut result = ProgressionResult::empty(staged.level(&self.rules.curve));

        result.streak_delta = Some(record_streak(&mut staged, activity_date, correlation_id, at)?);
        self.unlock_badges(&mut staged, correlation_id, at, &mut result);

        *player = staged;
        Ok(result)
    }

    /// Unlocks every badge whose rule now holds and that the player lacks.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` for an unregistered player.
    pub fn evaluate_badges(
        &self,
        player: &mut Player,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Vec<Badge>, DomainError> {
        ensure_registered(player, "evaluate badges")?;
        let mut result = ProgressionResult::empty(player.level(&self.rules.curve));
        self.unlock_badges(player, correlation_id, clock.now(), &mut result);
        Ok(result.newly_earned_badges)
    }

    fn fold_answer(
        &self,
        staged: &mut Player,
        outcome: &AnswerOutcome,
        activity_date: NaiveDate,
        correlation_id: Uuid,
        at: DateTime<Utc>,
        result: &mut ProgressionResult,
    ) -> Result<(), DomainError> {
        if outcome.xp_awarded > 0 && !outcome.is_correct {
            return Err(DomainError::InvalidArgument(format!(
                "incorrect answer to {} cannot award {} xp",
                outcome.question_id, outcome.xp_awarded
            )));
        }
        if outcome.timed_out && outcome.is_correct {
            return Err(DomainError::InvalidArgument(format!(
                "timed-out answer to {} cannot be correct",
                outcome.question_id
            )));
        }
        if outcome.elapsed_ms < 0 {
            return Err(DomainError::InvalidArgument(format!(
                "answer to {} has negative elapsed time",
                outcome.question_id
            )));
        }

        // 1. XP
        let previous_level = staged.level(&self.rules.curve).level;
        staged.record(
            ProgressionEventKind::AnswerRecorded(AnswerRecorded {
                player_id: staged.id,
                question_id: outcome.question_id.clone(),
                is_correct: outcome.is_correct,
                xp_awarded: outcome.xp_awarded,
                fast: self.is_fast(outcome),
                timed_out: outcome.timed_out,
            }),
            correlation_id,
            at,
        );
        result.xp_gained += u64::from(outcome.xp_awarded);

        // 2. Level
        let level = staged.level(&self.rules.curve).level;
        if level > previous_level {
            debug!(player_id = %staged.id, previous_level, level, "level up");
            staged.record(
                ProgressionEventKind::LevelReached(LevelReached {
                    player_id: staged.id,
                    previous_level,
                    level,
                }),
                correlation_id,
                at,
            );
            result.leveled_up = true;
            result.new_level = Some(level);
        }

        // 3. Streak, first answer of the day only
        if staged.streak().last_activity() != Some(activity_date) {
            result.streak_delta = Some(record_streak(staged, activity_date, correlation_id, at)?);
        }

        // 4. Badges
        self.unlock_badges(staged, correlation_id, at, result);
        Ok(())
    }

    fn is_fast(&self, outcome: &AnswerOutcome) -> bool {
        outcome.is_correct
            && !outcome.timed_out
            && outcome.elapsed_ms <= self.rules.fast_answer_threshold.num_milliseconds()
    }

    fn unlock_badges(
        &self,
        staged: &mut Player,
        correlation_id: Uuid,
        at: DateTime<Utc>,
        result: &mut ProgressionResult,
    ) {
        let unlocked: Vec<Badge> = self
            .rules
            .badges
            .evaluate(&staged.badge_facts(&self.rules.curve), staged.badges())
            .into_iter()
            .cloned()
            .collect();
        for badge in unlocked {
            debug!(player_id = %staged.id, badge_id = %badge.id, "badge earned");
            staged.record(
                ProgressionEventKind::BadgeEarned(BadgeEarned {
                    player_id: staged.id,
                    badge_id: badge.id.clone(),
                }),
                correlation_id,
                at,
            );
            result.newly_earned_badges.push(badge);
        }
    }
}

fn ensure_registered(player: &Player, operation: &'static str) -> Result<(), DomainError> {
    if player.is_registered() {
        Ok(())
    } else {
        Err(DomainError::invalid_transition("unregistered", operation))
    }
}

fn record_streak(
    staged: &mut Player,
    activity_date: NaiveDate,
    correlation_id: Uuid,
    at: DateTime<Utc>,
) -> Result<StreakDelta, DomainError> {
    let (_, delta) = staged.streak().record_activity(activity_date)?;
    if !delta.is_zero() {
        staged.record(
            ProgressionEventKind::StreakUpdated(StreakUpdated {
                player_id: staged.id,
                activity_date,
                change: delta.change,
                current: delta.current,
                longest: delta.longest,
            }),
            correlation_id,
            at,
        );
    }
    Ok(delta)
}
