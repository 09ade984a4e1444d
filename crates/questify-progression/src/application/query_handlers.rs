//! Query handlers for the Progression context.
//!
//! This module contains query handlers that reconstitute players from stored
//! events and return read-only view DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use questify_core::error::DomainError;
use questify_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::badges::BadgeGallery;
use crate::domain::engine::ProgressionEngine;
use crate::domain::leaderboard::Leaderboard;
use crate::domain::level::LevelProgress;
use crate::domain::stats::PlayerStats;

/// Read-only view of a player's streak.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakView {
    /// Current streak as of the queried day; zero once a day was missed.
    pub current: u32,
    /// Longest streak ever.
    pub longest: u32,
    /// Last day with activity.
    pub last_activity: Option<NaiveDate>,
    /// Monday-first activity for the week containing the queried day.
    pub week: [bool; 7],
}

/// Read-only view of an earned badge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadgeView {
    /// The badge identifier.
    pub badge_id: String,
    /// When it was earned.
    pub earned_at: DateTime<Utc>,
}

/// Read-only view of a player.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// The player identifier.
    pub player_id: Uuid,
    /// Leaderboard name.
    pub display_name: String,
    /// Level and progress derived from XP.
    pub level: LevelProgress,
    /// Streak state.
    pub streak: StreakView,
    /// Running counters.
    pub stats: PlayerStats,
    /// Earned badges, ordered by id.
    pub badges: Vec<EarnedBadgeView>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a player by id, with the streak seen from `today`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_player_by_id(
    player_id: Uuid,
    today: NaiveDate,
    engine: &ProgressionEngine,
    repo: &dyn EventRepository,
) -> Result<PlayerView, DomainError> {
    let player = command_handlers::load_player(player_id, repo).await?;

    let streak = StreakView {
        current: player.streak().current_as_of(today),
        longest: player.streak().longest(),
        last_activity: player.streak().last_activity(),
        week: player.streak().week_activity(today),
    };

    let badges = player
        .badges()
        .iter()
        .map(|(badge_id, earned_at)| EarnedBadgeView {
            badge_id: badge_id.clone(),
            earned_at: *earned_at,
        })
        .collect();

    Ok(PlayerView {
        player_id,
        display_name: player.display_name().to_owned(),
        level: player.level(&engine.rules().curve),
        streak,
        stats: player.stats().clone(),
        badges,
        version: player.version,
    })
}

/// Retrieves the badge gallery for a player.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
pub async fn get_badge_gallery(
    player_id: Uuid,
    engine: &ProgressionEngine,
    repo: &dyn EventRepository,
) -> Result<BadgeGallery, DomainError> {
    let player = command_handlers::load_player(player_id, repo).await?;
    Ok(engine.rules().badges.gallery(player.badges()))
}

/// Loads every listed player and ranks them.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if any listed player is unknown.
pub async fn get_leaderboard(
    player_ids: &[Uuid],
    engine: &ProgressionEngine,
    repo: &dyn EventRepository,
) -> Result<Leaderboard, DomainError> {
    let mut snapshots = Vec::with_capacity(player_ids.len());
    for &player_id in player_ids {
        let player = command_handlers::load_player(player_id, repo).await?;
        snapshots.push(player.snapshot(&engine.rules().curve));
    }
    Ok(engine.rank(snapshots))
}
