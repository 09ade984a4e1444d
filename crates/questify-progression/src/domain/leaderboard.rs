//! Leaderboard ranking over point-in-time player snapshots.

use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

/// Read-only projection of a player used for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub player_id: Uuid,
    pub display_name: String,
    pub xp: u64,
    pub level: u32,
}

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based, contiguous, never shared.
    pub rank: u32,
    pub player_id: Uuid,
    pub display_name: String,
    pub level: u32,
    pub xp: u64,
}

/// Ranked standings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

/// XP descending, then level descending, then player id ascending.
fn standing(a: &PlayerSnapshot, b: &PlayerSnapshot) -> Ordering {
    b.xp.cmp(&a.xp)
        .then_with(|| b.level.cmp(&a.level))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

impl Leaderboard {
    /// Ranks snapshots. Input order never affects the result.
    #[must_use]
    pub fn rank(mut snapshots: Vec<PlayerSnapshot>) -> Self {
        snapshots.sort_by(standing);
        let entries = snapshots
            .into_iter()
            .zip(1u32..)
            .map(|(snapshot, rank)| LeaderboardEntry {
                rank,
                player_id: snapshot.player_id,
                display_name: snapshot.display_name,
                level: snapshot.level,
                xp: snapshot.xp,
            })
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// The entry for `player_id`, if the player was ranked.
    #[must_use]
    pub fn position_of(&self, player_id: Uuid) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|entry| entry.player_id == player_id)
    }

    /// The first `n` entries.
    #[must_use]
    pub fn top(&self, n: usize) -> &[LeaderboardEntry] {
        &self.entries[..n.min(self.entries.len())]
    }
}
