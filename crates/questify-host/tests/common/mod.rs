//! Shared test helpers for host integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::TimeDelta;
use questify_core::clock::{Clock, DayBoundary};
use questify_core::repository::EventRepository;
use questify_host::catalog::parse_catalog;
use questify_host::clock::ManualClock;
use questify_host::host::QuestifyHost;
use questify_host::repository::InMemoryEventRepository;
use questify_progression::domain::engine::{ProgressionEngine, ProgressionRules};
use questify_progression::domain::level::LevelCurve;
use questify_quiz::domain::session::SessionPolicy;
use questify_test_support::fixed_instant;

/// Three math tiers and one history quiz. Only the tier-1 quizzes are open
/// to a new player.
pub const CATALOG: &str = r#"
quizzes:
  - id: algebra-basics
    title: Algebra Basics
    subject: math
    difficulty: 1
    questions:
      - id: q1
        prompt: "Solve 2x = 10"
        xpReward: 50
        options:
          - { id: a, text: "4" }
          - { id: b, text: "5", correct: true }
      - id: q2
        prompt: "Solve x + 3 = 4"
        xpReward: 50
        options:
          - { id: a, text: "1", correct: true }
          - { id: b, text: "7" }
  - id: geometry
    title: Shapes
    subject: math
    difficulty: 2
    questions:
      - id: q1
        prompt: "Sides of a hexagon?"
        xpReward: 75
        options:
          - { id: a, text: "6", correct: true }
          - { id: b, text: "8" }
  - id: calculus
    title: Limits
    subject: math
    difficulty: 3
    questions:
      - id: q1
        prompt: "d/dx of x^2?"
        xpReward: 100
        options:
          - { id: a, text: "2x", correct: true }
          - { id: b, text: "x" }
  - id: world-history
    title: World History
    subject: history
    difficulty: 1
    questions:
      - id: q1
        prompt: "Year the Berlin Wall fell?"
        xpReward: 40
        options:
          - { id: a, text: "1989", correct: true }
          - { id: b, text: "1991" }
"#;

/// Per-question deadline used by every test host.
pub const DEADLINE_SECS: i64 = 30;

/// Builds a host on an in-memory store and a manual clock set to the fixed
/// test instant.
pub fn build_test_host() -> (Arc<QuestifyHost>, Arc<ManualClock>) {
    build_test_host_on(Arc::new(InMemoryEventRepository::new()))
}

/// As [`build_test_host`], over the given event store.
pub fn build_test_host_on(repo: Arc<dyn EventRepository>) -> (Arc<QuestifyHost>, Arc<ManualClock>) {
    let catalog = parse_catalog(CATALOG).unwrap();
    let clock = Arc::new(ManualClock::new(fixed_instant()));
    let host_clock: Arc<dyn Clock> = clock.clone();
    let engine = ProgressionEngine::new(ProgressionRules {
        curve: LevelCurve::default(),
        badges: catalog.badges,
        fast_answer_threshold: TimeDelta::seconds(10),
    });
    let host = QuestifyHost::new(
        catalog.quizzes,
        engine,
        SessionPolicy {
            question_deadline: TimeDelta::seconds(DEADLINE_SECS),
        },
        DayBoundary::utc(),
        host_clock,
        repo,
    );
    (Arc::new(host), clock)
}
