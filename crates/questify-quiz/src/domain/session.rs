//! Quiz session state machine.
//!
//! One `QuizSession` tracks a single attempt at a quiz:
//!
//! ```text
//! NotStarted -> InProgress -> AwaitingNext -> InProgress -> ... -> Finished
//!                    |              |
//!                    +--------------+--> Abandoned
//! ```
//!
//! All transitions go through [`QuizSession::transition`], a pure function
//! from the current session and a [`SessionCommand`] to the next session and
//! the [`SessionEvent`] it emits. The session never reads a clock or sleeps;
//! callers pass the current instant into every time-dependent command and
//! are responsible for polling [`QuizSession::is_expired`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use questify_core::error::DomainError;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::catalog::{Difficulty, Question, Quiz};

/// Default per-question deadline, in seconds.
pub const DEFAULT_QUESTION_DEADLINE_SECS: i64 = 30;

/// Host-configured timing policy for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// How long a player may take on one question before it counts as wrong.
    pub question_deadline: TimeDelta,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            question_deadline: TimeDelta::seconds(DEFAULT_QUESTION_DEADLINE_SECS),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    /// Created but not yet started.
    NotStarted,
    /// Showing the current question, waiting for an answer.
    InProgress,
    /// The current question has been answered or timed out.
    AwaitingNext,
    /// Every question has been answered.
    Finished,
    /// Cancelled or abandoned by the host; awards nothing.
    Abandoned,
}

impl SessionStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::AwaitingNext => "awaiting next",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        })
    }
}

/// Result of answering (or timing out on) one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    /// The question answered.
    pub question_id: String,
    /// The option chosen; absent when the deadline passed without an answer.
    pub option_id: Option<String>,
    /// Whether the answer counts as correct.
    pub is_correct: bool,
    /// The question's reward when correct, otherwise zero.
    pub xp_awarded: u32,
    /// Milliseconds between the question being shown and the answer.
    pub elapsed_ms: i64,
    /// Whether the question's deadline had passed.
    pub timed_out: bool,
}

/// Totals of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// The session this summarises.
    pub session_id: Uuid,
    /// The player who took the quiz.
    pub player_id: Uuid,
    /// The quiz taken.
    pub quiz_id: String,
    /// The quiz's subject tag.
    pub subject: String,
    /// The quiz's difficulty.
    pub difficulty: Difficulty,
    /// Number of correct answers.
    pub correct_count: u32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// Sum of XP awarded across all answers.
    pub total_xp: u64,
    /// `correct_count / total_questions`.
    pub accuracy: f64,
    /// Every answer in question order.
    pub outcomes: Vec<AnswerOutcome>,
    /// When the last `next` moved the session to `Finished`.
    pub finished_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Whether every question was answered correctly.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.correct_count == self.total_questions
    }
}

/// Position within a running session, for progress displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    /// 1-based number of the current question, capped at the total.
    pub question_number: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Questions answered or timed out so far.
    pub answered: usize,
    /// Of those, how many were correct.
    pub correct_count: u32,
}

/// Inputs to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand<'a> {
    /// Show the first question.
    Start {
        /// When the first question is shown.
        at: DateTime<Utc>,
    },
    /// Answer the current question.
    SubmitAnswer {
        /// The chosen option.
        option_id: &'a str,
        /// When the answer arrived.
        at: DateTime<Utc>,
    },
    /// Move past an answered question.
    Next {
        /// When the next question is shown.
        at: DateTime<Utc>,
    },
    /// Abandon the attempt.
    Cancel,
    /// Record the current question as timed out.
    Expire {
        /// The instant the host observed the expiry.
        at: DateTime<Utc>,
    },
}

impl SessionCommand<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start the session",
            Self::SubmitAnswer { .. } => "submit an answer",
            Self::Next { .. } => "advance to the next question",
            Self::Cancel => "cancel the session",
            Self::Expire { .. } => "expire the current question",
        }
    }
}

/// Outputs of the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The first question is now showing.
    Started {
        /// The first question's id.
        question_id: String,
    },
    /// The current question has been answered or timed out.
    Answered(AnswerOutcome),
    /// A later question is now showing.
    Advanced {
        /// 0-based index of the question now showing.
        question_index: usize,
        /// Its id.
        question_id: String,
    },
    /// The last question has been passed.
    Finished(SessionSummary),
    /// The session was abandoned; nothing it accumulated is awarded.
    Abandoned {
        /// How many questions had been answered when it was abandoned.
        answered: usize,
    },
}

/// One player's attempt at one quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    player_id: Uuid,
    quiz: Arc<Quiz>,
    policy: SessionPolicy,
    status: SessionStatus,
    index: usize,
    correct_count: u32,
    question_started_at: Option<DateTime<Utc>>,
    outcomes: Vec<AnswerOutcome>,
}

impl QuizSession {
    /// Creates a session in `NotStarted`.
    #[must_use]
    pub fn new(id: Uuid, player_id: Uuid, quiz: Arc<Quiz>, policy: SessionPolicy) -> Self {
        Self {
            id,
            player_id,
            quiz,
            policy,
            status: SessionStatus::NotStarted,
            index: 0,
            correct_count: 0,
            question_started_at: None,
            outcomes: Vec::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The player who owns the session.
    #[must_use]
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// The quiz being attempted.
    #[must_use]
    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Index of the current question; equals the question count only once
    /// finished.
    #[must_use]
    pub fn question_index(&self) -> usize {
        self.index
    }

    /// Answers recorded so far.
    #[must_use]
    pub fn outcomes(&self) -> &[AnswerOutcome] {
        &self.outcomes
    }

    /// The question being shown or just answered.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.status {
            SessionStatus::InProgress | SessionStatus::AwaitingNext => {
                self.quiz.questions().get(self.index)
            }
            _ => None,
        }
    }

    /// Where the player is in the quiz.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total_questions = self.quiz.questions().len();
        SessionProgress {
            question_number: (self.index + 1).min(total_questions),
            total_questions,
            answered: self.outcomes.len(),
            correct_count: self.correct_count,
        }
    }

    /// Instant after which the current question counts as timed out.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.status {
            SessionStatus::InProgress => self
                .question_started_at
                .map(|started| started + self.policy.question_deadline),
            _ => None,
        }
    }

    /// Whether the current question's deadline has passed at `now`.
    ///
    /// Only an `InProgress` session can expire.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now > deadline)
    }

    /// Computes the session that results from `command` without modifying
    /// this one.
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidArgument` when starting a quiz without questions.
    /// - `DomainError::NotFound` when the chosen option is not one of the
    ///   current question's options.
    /// - `DomainError::InvalidStateTransition` for any command the current
    ///   state does not accept, including a second answer to one question and
    ///   expiring a question whose deadline has not passed.
    pub fn transition(
        &self,
        command: SessionCommand<'_>,
    ) -> Result<(Self, SessionEvent), DomainError> {
        match (self.status, command) {
            (SessionStatus::NotStarted, SessionCommand::Start { at }) => self.begin(at),
            (_, SessionCommand::SubmitAnswer { .. } | SessionCommand::Expire { .. }) => {
                let (next, outcome) = self.score(command)?;
                Ok((next, SessionEvent::Answered(outcome)))
            }
            (SessionStatus::AwaitingNext, SessionCommand::Next { at }) => Ok(self.advance(at)),
            (
                SessionStatus::NotStarted | SessionStatus::InProgress | SessionStatus::AwaitingNext,
                SessionCommand::Cancel,
            ) => Ok(self.abandon()),
            (status, command) => Err(DomainError::invalid_transition(status, command.name())),
        }
    }

    fn begin(&self, at: DateTime<Utc>) -> Result<(Self, SessionEvent), DomainError> {
        let Some(first) = self.quiz.questions().first() else {
            return Err(DomainError::InvalidArgument(format!(
                "quiz {} has no questions",
                self.quiz.id()
            )));
        };
        let event = SessionEvent::Started {
            question_id: first.id().to_owned(),
        };
        let next = Self {
            status: SessionStatus::InProgress,
            index: 0,
            question_started_at: Some(at),
            ..self.clone()
        };
        Ok((next, event))
    }

    /// Scores the current question from an answer or an expiry.
    fn score(&self, command: SessionCommand<'_>) -> Result<(Self, AnswerOutcome), DomainError> {
        match (self.status, command) {
            (SessionStatus::InProgress, SessionCommand::SubmitAnswer { option_id, at }) => {
                self.answer(option_id, at)
            }
            (SessionStatus::InProgress, SessionCommand::Expire { at }) => {
                if !self.is_expired(at) {
                    return Err(DomainError::invalid_transition(
                        "the question deadline has not passed",
                        command.name(),
                    ));
                }
                Ok(self.record(None, false, at))
            }
            (status, command) => Err(DomainError::invalid_transition(status, command.name())),
        }
    }

    fn answer(
        &self,
        option_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(Self, AnswerOutcome), DomainError> {
        let question = &self.quiz.questions()[self.index];
        let option = question.option(option_id)?;
        Ok(self.record(Some(option_id), option.correct, at))
    }

    /// Appends an outcome for the current question and moves to
    /// `AwaitingNext`. A late answer counts as timed out and wrong.
    fn record(
        &self,
        option_id: Option<&str>,
        chose_correct: bool,
        at: DateTime<Utc>,
    ) -> (Self, AnswerOutcome) {
        let question = &self.quiz.questions()[self.index];
        let elapsed_ms = self
            .question_started_at
            .map_or(0, |started| (at - started).num_milliseconds().max(0));
        let timed_out = self.is_expired(at);
        let is_correct = chose_correct && !timed_out;
        let outcome = AnswerOutcome {
            question_id: question.id().to_owned(),
            option_id: option_id.map(str::to_owned),
            is_correct,
            xp_awarded: if is_correct { question.xp_reward() } else { 0 },
            elapsed_ms,
            timed_out,
        };

        let mut next = self.clone();
        next.status = SessionStatus::AwaitingNext;
        next.correct_count += u32::from(is_correct);
        next.outcomes.push(outcome.clone());
        (next, outcome)
    }

    fn advance(&self, at: DateTime<Utc>) -> (Self, SessionEvent) {
        let index = self.index + 1;
        let questions = self.quiz.questions();

        if let Some(question) = questions.get(index) {
            let next = Self {
                status: SessionStatus::InProgress,
                index,
                question_started_at: Some(at),
                ..self.clone()
            };
            let event = SessionEvent::Advanced {
                question_index: index,
                question_id: question.id().to_owned(),
            };
            return (next, event);
        }

        let next = Self {
            status: SessionStatus::Finished,
            index: questions.len(),
            question_started_at: None,
            ..self.clone()
        };
        let summary = next.summarize(at);
        (next, SessionEvent::Finished(summary))
    }

    fn abandon(&self) -> (Self, SessionEvent) {
        let event = SessionEvent::Abandoned {
            answered: self.outcomes.len(),
        };
        let next = Self {
            status: SessionStatus::Abandoned,
            correct_count: 0,
            question_started_at: None,
            outcomes: Vec::new(),
            ..self.clone()
        };
        (next, event)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn summarize(&self, finished_at: DateTime<Utc>) -> SessionSummary {
        let total_questions = self.quiz.questions().len() as u32;
        SessionSummary {
            session_id: self.id,
            player_id: self.player_id,
            quiz_id: self.quiz.id().to_owned(),
            subject: self.quiz.subject().to_owned(),
            difficulty: self.quiz.difficulty(),
            correct_count: self.correct_count,
            total_questions,
            total_xp: self
                .outcomes
                .iter()
                .map(|o| u64::from(o.xp_awarded))
                .sum(),
            accuracy: f64::from(self.correct_count) / f64::from(total_questions),
            outcomes: self.outcomes.clone(),
            finished_at,
        }
    }

    /// Applies `command` in place, returning the emitted event.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::transition`]; on error the session is unchanged.
    pub fn handle(&mut self, command: SessionCommand<'_>) -> Result<SessionEvent, DomainError> {
        let (next, event) = self.transition(command)?;
        self.replace(next);
        Ok(event)
    }

    fn replace(&mut self, next: Self) {
        debug!(
            session_id = %self.id,
            player_id = %self.player_id,
            quiz_id = %self.quiz.id(),
            from = %self.status,
            to = %next.status,
            question_index = next.index,
            "quiz session transition"
        );
        *self = next;
    }

    /// `NotStarted -> InProgress` at the first question.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::transition`].
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.handle(SessionCommand::Start { at }).map(|_| ())
    }

    /// `InProgress -> AwaitingNext`, returning the scored answer.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::transition`].
    pub fn submit_answer(
        &mut self,
        option_id: &str,
        at: DateTime<Utc>,
    ) -> Result<AnswerOutcome, DomainError> {
        let (next, outcome) = self.score(SessionCommand::SubmitAnswer { option_id, at })?;
        self.replace(next);
        Ok(outcome)
    }

    /// `AwaitingNext -> InProgress`, or `Finished` after the last question,
    /// in which case the summary is returned.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::transition`].
    pub fn next(&mut self, at: DateTime<Utc>) -> Result<Option<SessionSummary>, DomainError> {
        match self.handle(SessionCommand::Next { at })? {
            SessionEvent::Finished(summary) => Ok(Some(summary)),
            _ => Ok(None),
        }
    }

    /// Any non-terminal state `-> Abandoned`.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::transition`].
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.handle(SessionCommand::Cancel).map(|_| ())
    }

    /// `InProgress -> AwaitingNext` with a timed-out, incorrect answer.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::transition`].
    pub fn expire(&mut self, at: DateTime<Utc>) -> Result<AnswerOutcome, DomainError> {
        let (next, outcome) = self.score(SessionCommand::Expire { at })?;
        self.replace(next);
        Ok(outcome)
    }
}
