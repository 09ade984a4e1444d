//! Domain events for the Progression context.

use chrono::NaiveDate;
use questify_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::streak::StreakChange;

/// Emitted once when a player's stream is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistered {
    /// The player identifier.
    pub player_id: Uuid,
    /// Name shown on the leaderboard.
    pub display_name: String,
}

/// Emitted for every answer folded into the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecorded {
    /// The player identifier.
    pub player_id: Uuid,
    /// The answered question.
    pub question_id: String,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// XP added to the player's total.
    pub xp_awarded: u32,
    /// Whether the answer counted as fast.
    pub fast: bool,
    /// Whether the question deadline expired instead.
    pub timed_out: bool,
}

/// Emitted when the derived level goes up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelReached {
    /// The player identifier.
    pub player_id: Uuid,
    /// Level before the XP gain.
    pub previous_level: u32,
    /// Level after the XP gain.
    pub level: u32,
}

/// Emitted when a new activity day moves the streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdated {
    /// The player identifier.
    pub player_id: Uuid,
    /// The calendar day the activity fell on.
    pub activity_date: NaiveDate,
    /// How the streak moved.
    pub change: StreakChange,
    /// Current streak after the activity.
    pub current: u32,
    /// Longest streak after the activity.
    pub longest: u32,
}

/// Emitted when a badge is unlocked. The event timestamp is the earned date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeEarned {
    /// The player identifier.
    pub player_id: Uuid,
    /// The unlocked badge.
    pub badge_id: String,
}

/// Emitted when a finished quiz session is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizCompleted {
    /// The player identifier.
    pub player_id: Uuid,
    /// The committed session.
    pub session_id: Uuid,
    /// The completed quiz.
    pub quiz_id: String,
    /// The quiz's subject tag.
    pub subject: String,
    /// Number of correct answers.
    pub correct_count: u32,
    /// Number of questions in the quiz.
    pub total_questions: u32,
    /// XP earned over the whole session.
    pub total_xp: u64,
    /// Whether every answer was correct.
    pub perfect: bool,
}

/// Event payload variants for the Progression context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionEventKind {
    /// A player has been registered.
    PlayerRegistered(PlayerRegistered),
    /// An answer has been recorded.
    AnswerRecorded(AnswerRecorded),
    /// A new level has been reached.
    LevelReached(LevelReached),
    /// The streak has moved.
    StreakUpdated(StreakUpdated),
    /// A badge has been earned.
    BadgeEarned(BadgeEarned),
    /// A quiz has been completed.
    QuizCompleted(QuizCompleted),
}

impl ProgressionEventKind {
    /// Stable event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlayerRegistered(_) => "progression.player_registered",
            Self::AnswerRecorded(_) => "progression.answer_recorded",
            Self::LevelReached(_) => "progression.level_reached",
            Self::StreakUpdated(_) => "progression.streak_updated",
            Self::BadgeEarned(_) => "progression.badge_earned",
            Self::QuizCompleted(_) => "progression.quiz_completed",
        }
    }
}

/// Domain event envelope for the Progression context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: ProgressionEventKind,
}

impl DomainEvent for ProgressionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("ProgressionEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
