//! Commands for the Progression context.

use chrono::NaiveDate;
use questify_core::command::Command;
use questify_quiz::domain::session::{AnswerOutcome, SessionSummary};
use uuid::Uuid;

/// Command to create a player stream.
#[derive(Debug, Clone)]
pub struct RegisterPlayer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The new player's identifier.
    pub player_id: Uuid,
    /// Name shown on the leaderboard.
    pub display_name: String,
}

impl Command for RegisterPlayer {
    fn command_type(&self) -> &'static str {
        "progression.register_player"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.player_id
    }
}

/// Command to fold a single answer outcome into a player.
#[derive(Debug, Clone)]
pub struct ApplyAnswerOutcome {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The answering player.
    pub player_id: Uuid,
    /// The outcome produced by the quiz session.
    pub outcome: AnswerOutcome,
    /// Calendar day of the answer under the host's day boundary.
    pub activity_date: NaiveDate,
}

impl Command for ApplyAnswerOutcome {
    fn command_type(&self) -> &'static str {
        "progression.apply_answer_outcome"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.player_id
    }
}

/// Command to commit a finished quiz session.
#[derive(Debug, Clone)]
pub struct CommitSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Summary of the finished session; names the player.
    pub summary: SessionSummary,
    /// Calendar day the session finished on.
    pub activity_date: NaiveDate,
}

impl Command for CommitSession {
    fn command_type(&self) -> &'static str {
        "progression.commit_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.summary.player_id
    }
}

/// Command to record a day of activity outside a quiz.
#[derive(Debug, Clone)]
pub struct RecordActivity {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The active player.
    pub player_id: Uuid,
    /// Calendar day of the activity.
    pub activity_date: NaiveDate,
}

impl Command for RecordActivity {
    fn command_type(&self) -> &'static str {
        "progression.record_activity"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.player_id
    }
}

/// Command to re-run badge evaluation, e.g. after the catalog changed.
#[derive(Debug, Clone)]
pub struct EvaluateBadges {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player to evaluate.
    pub player_id: Uuid,
}

impl Command for EvaluateBadges {
    fn command_type(&self) -> &'static str {
        "progression.evaluate_badges"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.player_id
    }
}
