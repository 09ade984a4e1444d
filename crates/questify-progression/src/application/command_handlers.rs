//! Command handlers for the Progression context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: load the player stream, run the engine, persist
//! the staged events.

use questify_core::aggregate::AggregateRoot;
use questify_core::clock::Clock;
use questify_core::error::DomainError;
use questify_core::event::EventMetadata;
use questify_core::repository::{EventRepository, StoredEvent};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::Player;
use crate::domain::badges::Badge;
use crate::domain::commands::{
    ApplyAnswerOutcome, CommitSession, EvaluateBadges, RecordActivity, RegisterPlayer,
};
use crate::domain::engine::{ProgressionEngine, ProgressionResult};
use crate::domain::events::{ProgressionEvent, ProgressionEventKind};

/// Reconstitutes a `Player` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub(crate) fn reconstitute(
    player_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Player, DomainError> {
    let mut player = Player::new(player_id);
    for stored in existing_events {
        let kind: ProgressionEventKind = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DomainError::Infrastructure(format!("event deserialization failed: {e}")))?;
        let event = ProgressionEvent {
            metadata: EventMetadata {
                event_id: stored.event_id,
                event_type: stored.event_type.clone(),
                aggregate_id: stored.aggregate_id,
                sequence_number: stored.sequence_number,
                correlation_id: stored.correlation_id,
                causation_id: stored.causation_id,
                occurred_at: stored.occurred_at,
            },
            kind,
        };
        player.apply(&event);
    }
    Ok(player)
}

/// Loads a player that must already exist.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the stream is empty.
pub(crate) async fn load_player(
    player_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Player, DomainError> {
    let existing_events = repo.load_events(player_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(player_id));
    }
    reconstitute(player_id, &existing_events)
}

/// Appends the player's staged events and marks them committed.
async fn persist(
    player: &mut Player,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    let stored_events = player.pending_stored_events();

    if !stored_events.is_empty() {
        repo.append_events(player.id, player.version(), &stored_events)
            .await?;
    }
    player.clear_uncommitted_events();

    Ok(stored_events)
}

/// Handles the `RegisterPlayer` command: creates the player stream.
///
/// # Errors
///
/// Returns `DomainError::InvalidStateTransition` if the player already exists,
/// `DomainError::InvalidArgument` for a blank display name, or any error from
/// loading or appending events.
#[instrument(skip_all, fields(player_id = %command.player_id))]
pub async fn handle_register_player(
    command: &RegisterPlayer,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling register_player command");
    let existing_events = repo.load_events(command.player_id).await?;
    let mut player = reconstitute(command.player_id, &existing_events)?;

    player.register(&command.display_name, command.correlation_id, clock)?;

    persist(&mut player, repo).await
}

/// Handles the `ApplyAnswerOutcome` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown player, any engine
/// error, or any error from loading or appending events.
#[instrument(skip_all, fields(player_id = %command.player_id))]
pub async fn handle_apply_answer_outcome(
    command: &ApplyAnswerOutcome,
    engine: &ProgressionEngine,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<ProgressionResult, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling apply_answer_outcome command");
    let mut player = load_player(command.player_id, repo).await?;

    let result = engine.apply_answer_outcome(
        &mut player,
        &command.outcome,
        command.activity_date,
        command.correlation_id,
        clock,
    )?;

    persist(&mut player, repo).await?;
    Ok(result)
}

/// Handles the `CommitSession` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown player, any engine
/// error, or any error from loading or appending events.
#[instrument(skip_all, fields(player_id = %command.summary.player_id, session_id = %command.summary.session_id))]
pub async fn handle_commit_session(
    command: &CommitSession,
    engine: &ProgressionEngine,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<ProgressionResult, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling commit_session command");
    let mut player = load_player(command.summary.player_id, repo).await?;

    let result = engine.commit_session(
        &mut player,
        &command.summary,
        command.activity_date,
        command.correlation_id,
        clock,
    )?;

    persist(&mut player, repo).await?;
    Ok(result)
}

/// Handles the `RecordActivity` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown player,
/// `DomainError::OutOfOrderActivity` for a date in the past, or any error
/// from loading or appending events.
#[instrument(skip_all, fields(player_id = %command.player_id))]
pub async fn handle_record_activity(
    command: &RecordActivity,
    engine: &ProgressionEngine,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<ProgressionResult, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling record_activity command");
    let mut player = load_player(command.player_id, repo).await?;

    let result =
        engine.record_activity(&mut player, command.activity_date, command.correlation_id, clock)?;

    persist(&mut player, repo).await?;
    Ok(result)
}

/// Handles the `EvaluateBadges` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown player, or any
/// error from loading or appending events.
#[instrument(skip_all, fields(player_id = %command.player_id))]
pub async fn handle_evaluate_badges(
    command: &EvaluateBadges,
    engine: &ProgressionEngine,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<Vec<Badge>, DomainError> {
    info!(correlation_id = %command.correlation_id, "handling evaluate_badges command");
    let mut player = load_player(command.player_id, repo).await?;

    let unlocked = engine.evaluate_badges(&mut player, command.correlation_id, clock)?;

    persist(&mut player, repo).await?;
    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use questify_core::error::DomainError;
    use questify_quiz::domain::catalog::Difficulty;
    use questify_quiz::domain::session::{AnswerOutcome, SessionSummary};
    use uuid::Uuid;

    use super::*;
    use crate::domain::badges::BadgeCatalog;
    use crate::domain::engine::ProgressionRules;
    use questify_test_support::{
        EmptyEventRepository, FailingEventRepository, FixedClock, RecordingEventRepository,
        fixed_instant,
    };

    fn fixed_clock() -> FixedClock {
        FixedClock(fixed_instant())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn outcome(question_id: &str, xp: u32) -> AnswerOutcome {
        AnswerOutcome {
            question_id: question_id.into(),
            option_id: Some("b".into()),
            is_correct: true,
            xp_awarded: xp,
            elapsed_ms: 15_000,
            timed_out: false,
        }
    }

    async fn registered(repo: &RecordingEventRepository) -> Uuid {
        let player_id = Uuid::new_v4();
        handle_register_player(
            &RegisterPlayer {
                correlation_id: Uuid::new_v4(),
                player_id,
                display_name: "Ada".into(),
            },
            &fixed_clock(),
            repo,
        )
        .await
        .unwrap();
        player_id
    }

    #[tokio::test]
    async fn test_handle_register_player_persists_event() {
        let player_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let repo = RecordingEventRepository::default();

        let command = RegisterPlayer {
            correlation_id,
            player_id,
            display_name: "Ada".into(),
        };

        let result = handle_register_player(&command, &fixed_clock(), &repo).await;
        assert!(result.is_ok());

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);

        let (agg_id, expected_version, events) = &appended[0];
        assert_eq!(*agg_id, player_id);
        assert_eq!(*expected_version, 0);
        assert_eq!(events.len(), 1);

        let stored = &events[0];
        assert_eq!(stored.event_type, "progression.player_registered");
        assert_eq!(stored.sequence_number, 1);
        assert_eq!(stored.correlation_id, correlation_id);
        assert_eq!(stored.occurred_at, fixed_instant());
    }

    #[tokio::test]
    async fn test_handle_register_player_twice_returns_error() {
        let repo = RecordingEventRepository::default();
        let player_id = registered(&repo).await;

        let command = RegisterPlayer {
            correlation_id: Uuid::new_v4(),
            player_id,
            display_name: "Ada again".into(),
        };
        let result = handle_register_player(&command, &fixed_clock(), &repo).await;

        match result.unwrap_err() {
            DomainError::InvalidStateTransition { .. } => {}
            other => panic!("expected InvalidStateTransition, got {other:?}"),
        }
        assert_eq!(repo.appended_events().len(), 1);
    }

    #[tokio::test]
    async fn test_three_answers_persist_and_level_up_on_third() {
        // Arrange
        let repo = RecordingEventRepository::default();
        let player_id = registered(&repo).await;
        let engine = ProgressionEngine::default();

        // Act
        let mut results = Vec::new();
        for (question_id, xp) in [("q1", 50), ("q2", 50), ("q3", 100)] {
            let command = ApplyAnswerOutcome {
                correlation_id: Uuid::new_v4(),
                player_id,
                outcome: outcome(question_id, xp),
                activity_date: today(),
            };
            results.push(
                handle_apply_answer_outcome(&command, &engine, &fixed_clock(), &repo)
                    .await
                    .unwrap(),
            );
        }

        // Assert
        assert!(!results[0].leveled_up);
        assert!(!results[1].leveled_up);
        assert_eq!(results[2].new_level, Some(2));
        assert_eq!(results[2].level.xp, 200);

        let appended = repo.appended_events();
        let expected_versions: Vec<i64> = appended.iter().map(|(_, v, _)| *v).collect();
        // register, answer + streak, answer, answer + level
        assert_eq!(expected_versions, vec![0, 1, 3, 4]);

        let player = load_player(player_id, &repo).await.unwrap();
        assert_eq!(player.xp(), 200);
        assert_eq!(player.version(), 6);
    }

    #[tokio::test]
    async fn test_handle_apply_answer_outcome_for_unknown_player_returns_not_found() {
        let player_id = Uuid::new_v4();
        let command = ApplyAnswerOutcome {
            correlation_id: Uuid::new_v4(),
            player_id,
            outcome: outcome("q1", 50),
            activity_date: today(),
        };

        let result = handle_apply_answer_outcome(
            &command,
            &ProgressionEngine::default(),
            &fixed_clock(),
            &EmptyEventRepository,
        )
        .await;

        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, player_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_outcome_appends_nothing() {
        let repo = RecordingEventRepository::default();
        let player_id = registered(&repo).await;
        let mut bad = outcome("q1", 50);
        bad.is_correct = false;

        let command = ApplyAnswerOutcome {
            correlation_id: Uuid::new_v4(),
            player_id,
            outcome: bad,
            activity_date: today(),
        };
        let result =
            handle_apply_answer_outcome(&command, &ProgressionEngine::default(), &fixed_clock(), &repo)
                .await;

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
        assert_eq!(repo.appended_events().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_commit_session_persists_quiz_completion() {
        let repo = RecordingEventRepository::default();
        let player_id = registered(&repo).await;
        let engine = ProgressionEngine::new(ProgressionRules {
            badges: BadgeCatalog::standard(2),
            ..ProgressionRules::default()
        });
        let summary = SessionSummary {
            session_id: Uuid::new_v4(),
            player_id,
            quiz_id: "algebra".into(),
            subject: "math".into(),
            difficulty: Difficulty::EASY,
            correct_count: 1,
            total_questions: 1,
            total_xp: 50,
            accuracy: 1.0,
            outcomes: vec![outcome("q1", 50)],
            finished_at: fixed_instant(),
        };

        let command = CommitSession {
            correlation_id: Uuid::new_v4(),
            summary,
            activity_date: today(),
        };
        let result = handle_commit_session(&command, &engine, &fixed_clock(), &repo)
            .await
            .unwrap();

        let badge_ids: Vec<&str> = result.newly_earned_badges.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(badge_ids, vec!["first-steps", "perfect-score"]);

        let (_, _, events) = repo.appended_events().pop().unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                "progression.answer_recorded",
                "progression.streak_updated",
                "progression.quiz_completed",
                "progression.badge_earned",
                "progression.badge_earned",
            ]
        );
    }

    #[tokio::test]
    async fn test_handle_record_activity_same_day_appends_nothing() {
        let repo = RecordingEventRepository::default();
        let player_id = registered(&repo).await;
        let engine = ProgressionEngine::default();
        let command = RecordActivity {
            correlation_id: Uuid::new_v4(),
            player_id,
            activity_date: today(),
        };

        handle_record_activity(&command, &engine, &fixed_clock(), &repo)
            .await
            .unwrap();
        let second = handle_record_activity(&command, &engine, &fixed_clock(), &repo)
            .await
            .unwrap();

        assert!(second.streak_delta.unwrap().is_zero());
        assert_eq!(repo.appended_events().len(), 2);
    }

    #[tokio::test]
    async fn test_handle_evaluate_badges_propagates_infrastructure_error() {
        let command = EvaluateBadges {
            correlation_id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
        };

        let result = handle_evaluate_badges(
            &command,
            &ProgressionEngine::default(),
            &fixed_clock(),
            &FailingEventRepository,
        )
        .await;

        match result.unwrap_err() {
            DomainError::Infrastructure(msg) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[test]
    fn test_reconstitute_rejects_malformed_payload() {
        let player_id = Uuid::new_v4();
        let stored = StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: player_id,
            event_type: "progression.player_registered".into(),
            payload: serde_json::json!({"unexpected": true}),
            sequence_number: 1,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: fixed_instant(),
        };

        let result = reconstitute(player_id, &[stored]);

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
