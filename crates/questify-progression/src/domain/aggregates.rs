//! Aggregate roots for the Progression context.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use questify_core::aggregate::AggregateRoot;
use questify_core::clock::Clock;
use questify_core::error::DomainError;
use questify_core::event::EventMetadata;
use uuid::Uuid;

use super::badges::BadgeFacts;
use super::events::{PlayerRegistered, ProgressionEvent, ProgressionEventKind};
use super::leaderboard::PlayerSnapshot;
use super::level::{LevelCurve, LevelProgress};
use super::stats::PlayerStats;
use super::streak::Streak;

/// The aggregate root for a player's progression.
///
/// State is only ever changed by folding a `ProgressionEvent`, either one
/// loaded from the store (`apply`) or one just staged by the engine
/// (`record`). Level is not stored; callers derive it through a `LevelCurve`.
#[derive(Debug, Clone)]
pub struct Player {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (persisted event count).
    pub(crate) version: i64,
    registered: bool,
    display_name: String,
    xp: u64,
    streak: Streak,
    badges: BTreeMap<String, DateTime<Utc>>,
    stats: PlayerStats,
    committed_sessions: BTreeSet<Uuid>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<ProgressionEvent>,
}

impl Player {
    /// Creates an empty, unregistered player stream.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            registered: false,
            display_name: String::new(),
            xp: 0,
            streak: Streak::default(),
            badges: BTreeMap::new(),
            stats: PlayerStats::default(),
            committed_sessions: BTreeSet::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Registers the player, producing a `PlayerRegistered` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the display name is blank.
    /// Returns `DomainError::InvalidStateTransition` if the player is already
    /// registered.
    pub fn register(
        &mut self,
        display_name: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.registered {
            return Err(DomainError::invalid_transition("registered", "register a player"));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DomainError::InvalidArgument(
                "display name must not be blank".into(),
            ));
        }
        self.record(
            ProgressionEventKind::PlayerRegistered(PlayerRegistered {
                player_id: self.id,
                display_name: display_name.to_owned(),
            }),
            correlation_id,
            clock.now(),
        );
        Ok(())
    }

    /// Stages an event: folds it into state and queues it for persistence.
    pub(crate) fn record(
        &mut self,
        kind: ProgressionEventKind,
        correlation_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) {
        let event = ProgressionEvent {
            metadata: EventMetadata::caused_by_command(
                kind.event_type(),
                self.id,
                self.next_sequence_number(),
                correlation_id,
                occurred_at,
            ),
            kind,
        };
        self.mutate(&event);
        self.uncommitted_events.push(event);
    }

    fn mutate(&mut self, event: &ProgressionEvent) {
        match &event.kind {
            ProgressionEventKind::PlayerRegistered(payload) => {
                self.registered = true;
                self.display_name.clone_from(&payload.display_name);
            }
            ProgressionEventKind::AnswerRecorded(payload) => {
                self.xp = self.xp.saturating_add(u64::from(payload.xp_awarded));
                self.stats.questions_answered += 1;
                if payload.is_correct {
                    self.stats.correct_answers += 1;
                }
                if payload.fast {
                    self.stats.fast_answers += 1;
                }
            }
            ProgressionEventKind::LevelReached(_) => {}
            ProgressionEventKind::StreakUpdated(payload) => {
                self.streak =
                    self.streak
                        .with_recorded(payload.activity_date, payload.current, payload.longest);
            }
            ProgressionEventKind::BadgeEarned(payload) => {
                self.badges
                    .entry(payload.badge_id.clone())
                    .or_insert(event.metadata.occurred_at);
            }
            ProgressionEventKind::QuizCompleted(payload) => {
                self.committed_sessions.insert(payload.session_id);
                self.stats.quizzes_completed += 1;
                if payload.perfect {
                    self.stats.perfect_scores += 1;
                }
                self.stats
                    .completed_by_subject
                    .entry(payload.subject.clone())
                    .or_default()
                    .insert(payload.quiz_id.clone());
            }
        }
    }

    /// Whether a `PlayerRegistered` event has been folded in.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Cumulative XP.
    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    #[must_use]
    pub fn streak(&self) -> &Streak {
        &self.streak
    }

    /// Earned badge ids with the instant each was earned.
    #[must_use]
    pub fn badges(&self) -> &BTreeMap<String, DateTime<Utc>> {
        &self.badges
    }

    #[must_use]
    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.contains_key(badge_id)
    }

    #[must_use]
    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    /// Whether a quiz session has already been committed.
    #[must_use]
    pub fn has_committed(&self, session_id: Uuid) -> bool {
        self.committed_sessions.contains(&session_id)
    }

    /// Level derived from current XP.
    #[must_use]
    pub fn level(&self, curve: &LevelCurve) -> LevelProgress {
        curve.progress(self.xp)
    }

    /// Snapshot consumed by badge rules.
    #[must_use]
    pub fn badge_facts(&self, curve: &LevelCurve) -> BadgeFacts<'_> {
        BadgeFacts {
            xp: self.xp,
            level: self.level(curve).level,
            longest_streak: self.streak.longest(),
            stats: &self.stats,
        }
    }

    /// Projection used for leaderboard ranking.
    #[must_use]
    pub fn snapshot(&self, curve: &LevelCurve) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.id,
            display_name: self.display_name.clone(),
            xp: self.xp,
            level: self.level(curve).level,
        }
    }
}

impl AggregateRoot for Player {
    type Event = ProgressionEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        self.mutate(event);
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    #[allow(clippy::cast_possible_wrap)]
    fn clear_uncommitted_events(&mut self) {
        self.version += self.uncommitted_events.len() as i64;
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{AnswerRecorded, BadgeEarned};
    use questify_core::event::DomainEvent;
    use questify_test_support::{FixedClock, fixed_instant};

    #[test]
    fn test_register_produces_player_registered_event() {
        // Arrange
        let player_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let clock = FixedClock(fixed_instant());
        let mut player = Player::new(player_id);

        // Act
        player.register("  Ada ", correlation_id, &clock).unwrap();

        // Assert
        let events = player.uncommitted_events();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.event_type(), "progression.player_registered");

        let meta = event.metadata();
        assert_eq!(meta.aggregate_id, player_id);
        assert_eq!(meta.sequence_number, 1);
        assert_eq!(meta.correlation_id, correlation_id);
        assert_eq!(meta.occurred_at, fixed_instant());

        assert!(player.is_registered());
        assert_eq!(player.display_name(), "Ada");
        assert_eq!(player.version(), 0);
    }

    #[test]
    fn test_register_twice_is_invalid_state_transition() {
        let clock = FixedClock(fixed_instant());
        let mut player = Player::new(Uuid::new_v4());
        player.register("Ada", Uuid::new_v4(), &clock).unwrap();

        match player.register("Ada", Uuid::new_v4(), &clock).unwrap_err() {
            DomainError::InvalidStateTransition { state, .. } => assert_eq!(state, "registered"),
            other => panic!("expected InvalidStateTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_display_name_is_rejected() {
        let mut player = Player::new(Uuid::new_v4());

        let result = player.register("   ", Uuid::new_v4(), &FixedClock(fixed_instant()));

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        assert!(player.uncommitted_events().is_empty());
    }

    #[test]
    fn test_sequence_numbers_continue_after_clear() {
        let clock = FixedClock(fixed_instant());
        let mut player = Player::new(Uuid::new_v4());
        player.register("Ada", Uuid::new_v4(), &clock).unwrap();
        player.clear_uncommitted_events();

        player.record(
            ProgressionEventKind::AnswerRecorded(AnswerRecorded {
                player_id: player.id,
                question_id: "q1".into(),
                is_correct: true,
                xp_awarded: 50,
                fast: false,
                timed_out: false,
            }),
            Uuid::new_v4(),
            fixed_instant(),
        );

        assert_eq!(player.version(), 1);
        assert_eq!(player.uncommitted_events()[0].metadata.sequence_number, 2);
        assert_eq!(player.xp(), 50);
        assert_eq!(player.stats().correct_answers, 1);
    }

    #[test]
    fn test_apply_folds_persisted_events_and_bumps_version() {
        let clock = FixedClock(fixed_instant());
        let mut source = Player::new(Uuid::new_v4());
        source.register("Ada", Uuid::new_v4(), &clock).unwrap();
        source.record(
            ProgressionEventKind::BadgeEarned(BadgeEarned {
                player_id: source.id,
                badge_id: "first-steps".into(),
            }),
            Uuid::new_v4(),
            fixed_instant(),
        );

        let mut replayed = Player::new(source.id);
        for event in source.uncommitted_events() {
            replayed.apply(event);
        }

        assert_eq!(replayed.version(), 2);
        assert!(replayed.uncommitted_events().is_empty());
        assert_eq!(replayed.badges().get("first-steps"), Some(&fixed_instant()));
        assert_eq!(replayed.display_name(), "Ada");
    }

    #[test]
    fn test_level_is_derived_from_xp() {
        let mut player = Player::new(Uuid::new_v4());
        player.record(
            ProgressionEventKind::AnswerRecorded(AnswerRecorded {
                player_id: player.id,
                question_id: "q1".into(),
                is_correct: true,
                xp_awarded: 150,
                fast: true,
                timed_out: false,
            }),
            Uuid::new_v4(),
            fixed_instant(),
        );

        let curve = LevelCurve::default();

        assert_eq!(player.level(&curve).level, 2);
        assert_eq!(player.snapshot(&curve).level, 2);
        assert_eq!(player.badge_facts(&curve).stats.fast_answers, 1);
    }
}
