//! Integration tests for the host facade.

mod common;

use std::sync::Arc;

use chrono::TimeDelta;
use questify_core::clock::Clock;
use questify_core::error::DomainError;
use questify_host::host::NextStep;
use questify_quiz::domain::catalog::QuizStatus;
use questify_quiz::domain::session::SessionStatus;
use questify_test_support::FlakyAppendRepository;
use uuid::Uuid;

#[tokio::test]
async fn test_finished_session_commits_xp_streak_and_badges() {
    let (host, clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();

    let view = host.start_session(player_id, "algebra-basics").await.unwrap();
    assert_eq!(view.status, SessionStatus::InProgress);
    assert_eq!(view.question.as_ref().unwrap().id, "q1");
    assert_eq!(view.progress.total_questions, 2);

    clock.advance(TimeDelta::seconds(4));
    let outcome = host.submit_answer(view.session_id, "b").unwrap();
    assert!(outcome.is_correct);
    assert_eq!(outcome.xp_awarded, 50);

    let second = match host.next_question(view.session_id).await.unwrap() {
        NextStep::Question(second) => second,
        other => panic!("expected the second question, got {other:?}"),
    };
    assert_eq!(second.question.unwrap().id, "q2");

    clock.advance(TimeDelta::seconds(3));
    host.submit_answer(view.session_id, "a").unwrap();

    match host.next_question(view.session_id).await.unwrap() {
        NextStep::Finished {
            summary,
            progression,
        } => {
            assert!(summary.is_perfect());
            assert_eq!(summary.total_xp, 100);
            assert_eq!(progression.xp_gained, 100);
            assert!(!progression.leveled_up);
            assert_eq!(progression.level.level, 1);
            let earned: Vec<&str> = progression
                .newly_earned_badges
                .iter()
                .map(|b| b.id.as_str())
                .collect();
            assert_eq!(earned, vec!["first-steps", "perfect-score"]);
        }
        other => panic!("expected Finished, got {other:?}"),
    }

    assert_eq!(host.live_sessions().unwrap(), 0);
    let player = host.player(player_id).await.unwrap();
    assert_eq!(player.level.xp, 100);
    assert_eq!(player.streak.current, 1);
    assert_eq!(player.stats.quizzes_completed, 1);
    assert_eq!(player.stats.fast_answers, 2);
    assert_eq!(player.badges.len(), 2);
}

#[tokio::test]
async fn test_cancelled_session_awards_nothing() {
    let (host, _clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();
    let view = host.start_session(player_id, "algebra-basics").await.unwrap();
    host.submit_answer(view.session_id, "b").unwrap();

    host.cancel_session(view.session_id).unwrap();

    let player = host.player(player_id).await.unwrap();
    assert_eq!(player.level.xp, 0);
    assert_eq!(player.version, 1);
    match host.session(view.session_id).unwrap_err() {
        DomainError::NotFound(_) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_commit_keeps_session_for_retry() {
    // Arrange: registration is append 1, the session commit is append 2.
    let repo = Arc::new(FlakyAppendRepository::failing_append(2));
    let (host, _clock) = common::build_test_host_on(repo.clone());
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();
    let view = host.start_session(player_id, "world-history").await.unwrap();
    host.submit_answer(view.session_id, "a").unwrap();

    // Act
    let first = host.next_question(view.session_id).await;

    // Assert: nothing committed, the finished session is still held.
    match first.unwrap_err() {
        DomainError::Infrastructure(_) => {}
        other => panic!("expected Infrastructure, got {other:?}"),
    }
    assert_eq!(host.player(player_id).await.unwrap().level.xp, 0);
    assert_eq!(host.session(view.session_id).unwrap().status, SessionStatus::Finished);

    let retry = host.next_question(view.session_id).await.unwrap();

    match retry {
        NextStep::Finished { summary, progression } => {
            assert_eq!(summary.total_xp, 40);
            assert_eq!(progression.xp_gained, 40);
        }
        other => panic!("expected Finished, got {other:?}"),
    }
    assert_eq!(host.player(player_id).await.unwrap().level.xp, 40);
    assert_eq!(repo.appended_events().len(), 2);
    assert_eq!(host.live_sessions().unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_discards_session_held_after_failed_commit() {
    let repo = Arc::new(FlakyAppendRepository::failing_append(2));
    let (host, _clock) = common::build_test_host_on(repo);
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();
    let view = host.start_session(player_id, "world-history").await.unwrap();
    host.submit_answer(view.session_id, "a").unwrap();
    assert!(host.next_question(view.session_id).await.is_err());

    host.cancel_session(view.session_id).unwrap();

    assert_eq!(host.live_sessions().unwrap(), 0);
    assert_eq!(host.player(player_id).await.unwrap().level.xp, 0);
    assert!(host.start_session(player_id, "world-history").await.is_ok());
}

#[tokio::test]
async fn test_locked_quiz_cannot_be_started() {
    let (host, _clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();

    let result = host.start_session(player_id, "geometry").await;

    match result.unwrap_err() {
        DomainError::InvalidStateTransition { state, .. } => {
            assert_eq!(state, "quiz geometry is locked until level 3");
        }
        other => panic!("expected InvalidStateTransition, got {other:?}"),
    }
    assert_eq!(host.live_sessions().unwrap(), 0);
}

#[tokio::test]
async fn test_player_cannot_run_two_sessions_at_once() {
    let (host, _clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();
    host.start_session(player_id, "algebra-basics").await.unwrap();

    let result = host.start_session(player_id, "world-history").await;

    assert!(matches!(
        result,
        Err(DomainError::InvalidStateTransition { .. })
    ));
    assert_eq!(host.live_sessions().unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_player_and_quiz_are_rejected() {
    let (host, _clock) = common::build_test_host();
    let player_id = Uuid::new_v4();

    match host.start_session(player_id, "algebra-basics").await.unwrap_err() {
        DomainError::AggregateNotFound(id) => assert_eq!(id, player_id),
        other => panic!("expected AggregateNotFound, got {other:?}"),
    }

    host.register_player(player_id, "Ada").await.unwrap();
    match host.start_session(player_id, "astronomy").await.unwrap_err() {
        DomainError::NotFound(msg) => assert_eq!(msg, "quiz astronomy"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sweep_times_out_overdue_question() {
    let (host, clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();
    let view = host.start_session(player_id, "world-history").await.unwrap();

    clock.advance(TimeDelta::seconds(common::DEADLINE_SECS));
    assert!(host.sweep_expired(clock.now()).unwrap().is_empty());

    clock.advance(TimeDelta::seconds(1));
    let expired = host.sweep_expired(clock.now()).unwrap();

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].session_id, view.session_id);
    assert_eq!(expired[0].player_id, player_id);
    assert!(expired[0].outcome.timed_out);
    assert!(!expired[0].outcome.is_correct);
    assert_eq!(expired[0].outcome.xp_awarded, 0);

    // Too late to answer now.
    assert!(matches!(
        host.submit_answer(view.session_id, "a"),
        Err(DomainError::InvalidStateTransition { .. })
    ));

    match host.next_question(view.session_id).await.unwrap() {
        NextStep::Finished {
            summary,
            progression,
        } => {
            assert_eq!(summary.correct_count, 0);
            assert_eq!(progression.xp_gained, 0);
        }
        other => panic!("expected Finished, got {other:?}"),
    }
    let player = host.player(player_id).await.unwrap();
    assert_eq!(player.stats.quizzes_completed, 1);
    assert_eq!(player.stats.perfect_scores, 0);
}

#[tokio::test]
async fn test_leaderboard_ranks_by_xp() {
    let (host, clock) = common::build_test_host();
    let ada = Uuid::new_v4();
    let grace = Uuid::new_v4();
    host.register_player(ada, "Ada").await.unwrap();
    host.register_player(grace, "Grace").await.unwrap();

    let session = host.start_session(grace, "world-history").await.unwrap();
    clock.advance(TimeDelta::seconds(2));
    host.submit_answer(session.session_id, "a").unwrap();
    host.next_question(session.session_id).await.unwrap();

    let leaderboard = host.leaderboard().await.unwrap();

    let names: Vec<&str> = leaderboard
        .entries()
        .iter()
        .map(|e| e.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Grace", "Ada"]);
    assert_eq!(leaderboard.entries()[0].rank, 1);
    assert_eq!(leaderboard.entries()[0].xp, 40);
    assert_eq!(leaderboard.position_of(ada).unwrap().rank, 2);
}

#[tokio::test]
async fn test_catalog_view_reflects_player_progress() {
    let (host, clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();
    let session = host.start_session(player_id, "world-history").await.unwrap();
    clock.advance(TimeDelta::seconds(2));
    host.submit_answer(session.session_id, "b").unwrap();
    host.next_question(session.session_id).await.unwrap();

    let view = host.catalog_view(player_id).await.unwrap();

    let statuses: Vec<(&str, QuizStatus)> = view
        .quizzes
        .iter()
        .map(|q| (q.id.as_str(), q.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("algebra-basics", QuizStatus::Available),
            ("geometry", QuizStatus::Locked),
            ("calculus", QuizStatus::Locked),
            ("world-history", QuizStatus::Completed),
        ]
    );
    assert_eq!(view.quizzes[2].required_level, 6);
    let history = view.subjects.iter().find(|s| s.subject == "history").unwrap();
    assert_eq!((history.quiz_count, history.completed), (1, 1));
    let math = view.subjects.iter().find(|s| s.subject == "math").unwrap();
    assert_eq!((math.quiz_count, math.completed), (3, 0));
}

#[tokio::test]
async fn test_badge_gallery_lists_every_badge() {
    let (host, _clock) = common::build_test_host();
    let player_id = Uuid::new_v4();
    host.register_player(player_id, "Ada").await.unwrap();

    let gallery = host.badge_gallery(player_id).await.unwrap();

    assert_eq!(gallery.total, 6);
    assert_eq!(gallery.earned, 0);
    assert!(gallery.entries.iter().all(|e| !e.earned));
}
