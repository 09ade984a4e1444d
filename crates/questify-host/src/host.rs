//! The host facade: wires the quiz catalog, the session registry and the
//! progression engine to one clock and one event store.
//!
//! Session state lives only in memory. Progression is event-sourced and is
//! committed once per finished session.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use questify_core::clock::{Clock, DayBoundary};
use questify_core::error::DomainError;
use questify_core::repository::EventRepository;
use questify_progression::application::command_handlers::{
    handle_commit_session, handle_register_player,
};
use questify_progression::application::query_handlers::{
    PlayerView, get_badge_gallery, get_leaderboard, get_player_by_id,
};
use questify_progression::domain::badges::BadgeGallery;
use questify_progression::domain::commands::{CommitSession, RegisterPlayer};
use questify_progression::domain::engine::{ProgressionEngine, ProgressionResult};
use questify_progression::domain::leaderboard::Leaderboard;
use questify_quiz::domain::catalog::{Difficulty, QuizCatalog, QuizStatus, SubjectProgress};
use questify_quiz::domain::session::{
    AnswerOutcome, QuizSession, SessionPolicy, SessionProgress, SessionStatus, SessionSummary,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::sessions::SessionRegistry;

/// An answer choice as shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: String,
    pub text: String,
}

/// The current question, without its answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<OptionView>,
    pub xp_reward: u32,
}

/// Read-only view of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub player_id: Uuid,
    pub quiz_id: String,
    pub quiz_title: String,
    pub status: SessionStatus,
    pub progress: SessionProgress,
    pub question: Option<QuestionView>,
    pub deadline: Option<DateTime<Utc>>,
    /// Result of the most recent answer or timeout.
    pub last_outcome: Option<AnswerOutcome>,
}

impl From<&QuizSession> for SessionView {
    fn from(session: &QuizSession) -> Self {
        let question = session.current_question().map(|q| QuestionView {
            id: q.id().to_owned(),
            prompt: q.prompt().to_owned(),
            options: q
                .options()
                .iter()
                .map(|o| OptionView {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
            xp_reward: q.xp_reward(),
        });
        Self {
            session_id: session.id(),
            player_id: session.player_id(),
            quiz_id: session.quiz().id().to_owned(),
            quiz_title: session.quiz().title().to_owned(),
            status: session.status(),
            progress: session.progress(),
            question,
            deadline: session.deadline(),
            last_outcome: session.outcomes().last().cloned(),
        }
    }
}

/// What advancing a session led to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum NextStep {
    /// The next question is showing.
    Question(SessionView),
    /// The quiz is over and its XP has been committed.
    Finished {
        summary: SessionSummary,
        progression: ProgressionResult,
    },
}

/// A question the deadline sweeper timed out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredAnswer {
    pub session_id: Uuid,
    pub player_id: Uuid,
    pub outcome: AnswerOutcome,
}

/// One quiz as the catalog screen shows it to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCard {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub question_count: usize,
    pub max_xp: u64,
    pub required_level: u32,
    pub status: QuizStatus,
}

/// The catalog as seen by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub quizzes: Vec<QuizCard>,
    pub subjects: Vec<SubjectProgress>,
}

/// Single-process host for the engine.
pub struct QuestifyHost {
    catalog: QuizCatalog,
    engine: ProgressionEngine,
    policy: SessionPolicy,
    day_boundary: DayBoundary,
    clock: Arc<dyn Clock>,
    repo: Arc<dyn EventRepository>,
    sessions: Mutex<SessionRegistry>,
    players: Mutex<BTreeSet<Uuid>>,
}

impl QuestifyHost {
    #[must_use]
    pub fn new(
        catalog: QuizCatalog,
        engine: ProgressionEngine,
        policy: SessionPolicy,
        day_boundary: DayBoundary,
        clock: Arc<dyn Clock>,
        repo: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            catalog,
            engine,
            policy,
            day_boundary,
            clock,
            repo,
            sessions: Mutex::new(SessionRegistry::new()),
            players: Mutex::new(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &QuizCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The player's calendar day right now.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.day_boundary.date_of(self.clock.now())
    }

    /// Creates a player.
    ///
    /// # Errors
    ///
    /// See [`handle_register_player`].
    #[instrument(skip(self, display_name))]
    pub async fn register_player(
        &self,
        player_id: Uuid,
        display_name: &str,
    ) -> Result<(), DomainError> {
        let command = RegisterPlayer {
            correlation_id: Uuid::new_v4(),
            player_id,
            display_name: display_name.to_owned(),
        };
        handle_register_player(&command, self.clock.as_ref(), self.repo.as_ref()).await?;
        lock(&self.players)?.insert(player_id);
        info!("player registered");
        Ok(())
    }

    /// Starts a session on `quiz_id` and shows its first question.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown quiz,
    /// `DomainError::AggregateNotFound` for an unknown player,
    /// `DomainError::InvalidArgument` for a quiz without questions, and
    /// `DomainError::InvalidStateTransition` if the quiz is locked for the
    /// player or the player is already in a session.
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        player_id: Uuid,
        quiz_id: &str,
    ) -> Result<SessionView, DomainError> {
        let quiz = self.catalog.get(quiz_id)?;
        let player = get_player_by_id(player_id, self.today(), &self.engine, self.repo.as_ref())
            .await?;
        let completed = player.stats.completed_quizzes();
        if self.catalog.status(&quiz, player.level.level, &completed) == QuizStatus::Locked {
            let required = self.catalog.unlock_levels().required_level(quiz.difficulty());
            return Err(DomainError::invalid_transition(
                format!("quiz {quiz_id} is locked until level {required}"),
                "start a session",
            ));
        }

        let mut session = QuizSession::new(Uuid::new_v4(), player_id, quiz, self.policy);
        session.start(self.clock.now())?;
        let view = SessionView::from(&session);
        lock(&self.sessions)?.insert(session)?;
        info!(session_id = %view.session_id, "session started");
        Ok(view)
    }

    /// Current state of a live session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown session.
    pub fn session(&self, session_id: Uuid) -> Result<SessionView, DomainError> {
        let sessions = lock(&self.sessions)?;
        sessions.get(session_id).map(SessionView::from)
    }

    /// Scores an answer to the current question.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown session or option, and
    /// `DomainError::InvalidStateTransition` if no question is awaiting an
    /// answer.
    #[instrument(skip(self))]
    pub fn submit_answer(
        &self,
        session_id: Uuid,
        option_id: &str,
    ) -> Result<AnswerOutcome, DomainError> {
        let now = self.clock.now();
        let mut sessions = lock(&self.sessions)?;
        let outcome = sessions.get_mut(session_id)?.submit_answer(option_id, now)?;
        info!(
            question_id = %outcome.question_id,
            correct = outcome.is_correct,
            timed_out = outcome.timed_out,
            "answer submitted"
        );
        Ok(outcome)
    }

    /// Moves past an answered question. After the last one the session is
    /// closed and its outcomes are committed to the player's progression.
    ///
    /// The session is released only once the commit succeeds. If it fails,
    /// the finished session keeps its summary and calling this again retries
    /// the commit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown session,
    /// `DomainError::InvalidStateTransition` if the current question is still
    /// open, or any error from committing the session.
    #[instrument(skip(self))]
    pub async fn next_question(&self, session_id: Uuid) -> Result<NextStep, DomainError> {
        let now = self.clock.now();
        let summary = {
            let mut sessions = lock(&self.sessions)?;
            let held = sessions.uncommitted(session_id).cloned();
            if let Some(summary) = held {
                info!("retrying session commit");
                summary
            } else {
                let session = sessions.get_mut(session_id)?;
                match session.next(now)? {
                    None => return Ok(NextStep::Question(SessionView::from(&*session))),
                    Some(summary) => {
                        sessions.hold_uncommitted(summary.clone());
                        summary
                    }
                }
            }
        };

        let command = CommitSession {
            correlation_id: Uuid::new_v4(),
            activity_date: self.day_boundary.date_of(summary.finished_at),
            summary,
        };
        let committed =
            handle_commit_session(&command, &self.engine, self.clock.as_ref(), self.repo.as_ref())
                .await;
        let progression = match committed {
            Ok(progression) => progression,
            Err(e) => {
                warn!(error = %e, "session commit failed, summary kept for retry");
                return Err(e);
            }
        };
        lock(&self.sessions)?.remove(session_id);
        info!(
            xp_gained = progression.xp_gained,
            level = progression.level.level,
            badges = progression.newly_earned_badges.len(),
            "session committed"
        );
        Ok(NextStep::Finished {
            summary: command.summary,
            progression,
        })
    }

    /// Abandons a live session. Nothing it scored is committed.
    ///
    /// A finished session whose commit failed is released without
    /// committing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown session.
    #[instrument(skip(self))]
    pub fn cancel_session(&self, session_id: Uuid) -> Result<(), DomainError> {
        let mut sessions = lock(&self.sessions)?;
        if sessions.uncommitted(session_id).is_some() {
            sessions.remove(session_id);
            warn!("uncommitted session discarded");
            return Ok(());
        }
        sessions.get_mut(session_id)?.cancel()?;
        sessions.remove(session_id);
        info!("session abandoned");
        Ok(())
    }

    /// Times out every open question whose deadline has passed at `now`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredAnswer>, DomainError> {
        let mut sessions = lock(&self.sessions)?;
        let mut expired = Vec::new();
        for session_id in sessions.expired(now) {
            let session = sessions.get_mut(session_id)?;
            let player_id = session.player_id();
            match session.expire(now) {
                Ok(outcome) => {
                    info!(%session_id, question_id = %outcome.question_id, "question timed out");
                    expired.push(ExpiredAnswer {
                        session_id,
                        player_id,
                        outcome,
                    });
                }
                Err(e) => warn!(%session_id, error = %e, "could not expire session"),
            }
        }
        Ok(expired)
    }

    /// Number of live sessions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn live_sessions(&self) -> Result<usize, DomainError> {
        Ok(lock(&self.sessions)?.len())
    }

    /// # Errors
    ///
    /// See [`get_player_by_id`].
    pub async fn player(&self, player_id: Uuid) -> Result<PlayerView, DomainError> {
        get_player_by_id(player_id, self.today(), &self.engine, self.repo.as_ref()).await
    }

    /// # Errors
    ///
    /// See [`get_badge_gallery`].
    pub async fn badge_gallery(&self, player_id: Uuid) -> Result<BadgeGallery, DomainError> {
        get_badge_gallery(player_id, &self.engine, self.repo.as_ref()).await
    }

    /// Ranks every player registered through this host.
    ///
    /// # Errors
    ///
    /// See [`get_leaderboard`].
    pub async fn leaderboard(&self) -> Result<Leaderboard, DomainError> {
        let player_ids: Vec<Uuid> = lock(&self.players)?.iter().copied().collect();
        get_leaderboard(&player_ids, &self.engine, self.repo.as_ref()).await
    }

    /// The catalog with each quiz's availability for `player_id`.
    ///
    /// # Errors
    ///
    /// See [`get_player_by_id`].
    pub async fn catalog_view(&self, player_id: Uuid) -> Result<CatalogView, DomainError> {
        let player = self.player(player_id).await?;
        let completed = player.stats.completed_quizzes();
        let unlock_levels = self.catalog.unlock_levels();

        let quizzes = self
            .catalog
            .quizzes()
            .iter()
            .map(|quiz| QuizCard {
                id: quiz.id().to_owned(),
                title: quiz.title().to_owned(),
                subject: quiz.subject().to_owned(),
                difficulty: quiz.difficulty(),
                question_count: quiz.questions().len(),
                max_xp: quiz.max_xp(),
                required_level: unlock_levels.required_level(quiz.difficulty()),
                status: self.catalog.status(quiz, player.level.level, &completed),
            })
            .collect();

        Ok(CatalogView {
            quizzes,
            subjects: self.catalog.subject_progress(&completed),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, DomainError> {
    mutex
        .lock()
        .map_err(|e| DomainError::Infrastructure(format!("host mutex poisoned: {e}")))
}
