//! XP to level mapping.

use questify_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Default XP step of the triangular curve: level 2 at 150 XP, 3 at 450, 4 at 900.
pub const DEFAULT_LEVEL_STEP: u64 = 150;

/// Default number of levels in the curve.
pub const DEFAULT_MAX_LEVEL: u32 = 100;

/// Strictly increasing table of cumulative XP thresholds.
///
/// `thresholds[n - 1]` is the XP needed to reach level `n`; level 1 always
/// starts at 0 XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct LevelCurve {
    thresholds: Vec<u64>,
}

impl LevelCurve {
    /// Builds a curve from explicit thresholds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the table is empty, does not
    /// start at 0, or is not strictly increasing.
    pub fn from_thresholds(thresholds: Vec<u64>) -> Result<Self, DomainError> {
        match thresholds.first() {
            None => {
                return Err(DomainError::InvalidArgument(
                    "level curve needs at least one threshold".into(),
                ));
            }
            Some(&first) if first != 0 => {
                return Err(DomainError::InvalidArgument(format!(
                    "level 1 must start at 0 xp, got {first}"
                )));
            }
            Some(_) => {}
        }
        if let Some(pos) = thresholds.windows(2).position(|w| w[0] >= w[1]) {
            return Err(DomainError::InvalidArgument(format!(
                "level thresholds must be strictly increasing: level {} needs {} but level {} needs {}",
                pos + 1,
                thresholds[pos],
                pos + 2,
                thresholds[pos + 1]
            )));
        }
        Ok(Self { thresholds })
    }

    /// Triangular curve: reaching level `n` takes `step * n * (n - 1) / 2` XP.
    ///
    /// Each level costs `step` more than the previous one.
    #[must_use]
    pub fn triangular(step: u64, max_level: u32) -> Self {
        let step = step.max(1);
        let thresholds = (1..=u64::from(max_level.max(1)))
            .map(|n| step.saturating_mul(n * (n - 1) / 2))
            .collect();
        Self { thresholds }
    }

    /// Highest reachable level.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    /// Cumulative XP needed to reach `level`, if the curve has that level.
    #[must_use]
    pub fn threshold(&self, level: u32) -> Option<u64> {
        let index = usize::try_from(level).ok()?.checked_sub(1)?;
        self.thresholds.get(index).copied()
    }

    /// Level and progress for a signed XP value from an untrusted source.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if `xp` is negative.
    pub fn level_for(&self, xp: i64) -> Result<LevelProgress, DomainError> {
        let xp = u64::try_from(xp)
            .map_err(|_| DomainError::InvalidArgument(format!("xp must not be negative, got {xp}")))?;
        Ok(self.progress(xp))
    }

    /// Level and progress for `xp`: the greatest level whose threshold is at
    /// most `xp`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn progress(&self, xp: u64) -> LevelProgress {
        // thresholds[0] == 0, so at least one threshold is <= xp.
        let reached = self.thresholds.partition_point(|&t| t <= xp);
        let level_floor = self.thresholds[reached - 1];
        let next_threshold = self.thresholds.get(reached).copied();
        LevelProgress {
            level: reached as u32,
            xp,
            level_floor,
            next_threshold,
            xp_into_level: xp - level_floor,
            xp_to_next_level: next_threshold.map(|next| next - xp),
        }
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::triangular(DEFAULT_LEVEL_STEP, DEFAULT_MAX_LEVEL)
    }
}

impl TryFrom<Vec<u64>> for LevelCurve {
    type Error = DomainError;

    fn try_from(thresholds: Vec<u64>) -> Result<Self, Self::Error> {
        Self::from_thresholds(thresholds)
    }
}

impl From<LevelCurve> for Vec<u64> {
    fn from(curve: LevelCurve) -> Self {
        curve.thresholds
    }
}

/// Where a given XP total sits on the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    /// Current level, starting at 1.
    pub level: u32,
    /// Cumulative XP.
    pub xp: u64,
    /// XP at which the current level started.
    pub level_floor: u64,
    /// XP at which the next level starts; `None` at the top of the curve.
    pub next_threshold: Option<u64>,
    /// XP earned since reaching the current level.
    pub xp_into_level: u64,
    /// XP still needed for the next level; `None` at the top of the curve.
    pub xp_to_next_level: Option<u64>,
}

impl LevelProgress {
    /// Fraction of the current level completed, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        match self.next_threshold {
            Some(next) => self.xp_into_level as f64 / (next - self.level_floor) as f64,
            None => 1.0,
        }
    }
}
