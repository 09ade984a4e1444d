//! Badge definitions and the rule dispatcher that unlocks them.
//!
//! Rules are a closed set of tagged variants evaluated by [`BadgeRule::holds`]
//! against a [`BadgeFacts`] snapshot. Nothing here reads global state, so the
//! same snapshot always unlocks the same badges.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use questify_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::stats::{Metric, PlayerStats};

/// Display rarity. Has no effect on unlocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        };
        f.write_str(name)
    }
}

/// Unlock predicate over a player's statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BadgeRule {
    /// Longest streak of at least `days` consecutive days.
    StreakAtLeast { days: u32 },
    /// A counter reached `count`.
    CountAtLeast { metric: Metric, count: u32 },
    /// Derived level reached `level`.
    LevelAtLeast { level: u32 },
    /// Cumulative XP reached `xp`.
    XpAtLeast { xp: u64 },
    /// At least `count` distinct quizzes of `subject` completed.
    SubjectCompletedAtLeast { subject: String, count: u32 },
    /// Every nested rule holds.
    AllOf { rules: Vec<BadgeRule> },
}

impl BadgeRule {
    /// Evaluates the rule against a snapshot.
    #[must_use]
    pub fn holds(&self, facts: &BadgeFacts<'_>) -> bool {
        match self {
            Self::StreakAtLeast { days } => facts.longest_streak >= *days,
            Self::CountAtLeast { metric, count } => facts.stats.metric(*metric) >= *count,
            Self::LevelAtLeast { level } => facts.level >= *level,
            Self::XpAtLeast { xp } => facts.xp >= *xp,
            Self::SubjectCompletedAtLeast { subject, count } => {
                facts.stats.subject_completed(subject) >= *count
            }
            Self::AllOf { rules } => rules.iter().all(|rule| rule.holds(facts)),
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::SubjectCompletedAtLeast { subject, .. } if subject.trim().is_empty() => Err(
                DomainError::InvalidArgument("subject rule needs a subject".into()),
            ),
            Self::AllOf { rules } if rules.is_empty() => Err(DomainError::InvalidArgument(
                "allOf rule needs at least one nested rule".into(),
            )),
            Self::AllOf { rules } => rules.iter().try_for_each(Self::validate),
            _ => Ok(()),
        }
    }
}

/// The player statistics a badge rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct BadgeFacts<'a> {
    pub xp: u64,
    pub level: u32,
    pub longest_streak: u32,
    pub stats: &'a PlayerStats,
}

/// An immutable badge definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub rarity: Rarity,
    pub rule: BadgeRule,
}

impl Badge {
    /// Creates a badge with no description or icon.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rarity: Rarity,
        rule: BadgeRule,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            icon: String::new(),
            rarity,
            rule,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// One badge as shown in a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    #[serde(flatten)]
    pub badge: Badge,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

/// Every catalog badge with the player's earned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeGallery {
    pub entries: Vec<GalleryEntry>,
    pub earned: usize,
    pub total: usize,
}

/// Ordered set of badge definitions with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Badge>", into = "Vec<Badge>")]
pub struct BadgeCatalog {
    badges: Vec<Badge>,
}

impl BadgeCatalog {
    /// Builds a catalog, validating ids and rules.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` for a blank or duplicate id, or
    /// a malformed rule.
    pub fn new(badges: Vec<Badge>) -> Result<Self, DomainError> {
        validate_badges(&badges)?;
        Ok(Self { badges })
    }

    /// The six stock badges. Math Wizard asks for `math_quiz_count` distinct
    /// math quizzes, at least one.
    #[must_use]
    pub fn standard(math_quiz_count: u32) -> Self {
        let badges = vec![
            Badge::new(
                "first-steps",
                "First Steps",
                Rarity::Common,
                BadgeRule::CountAtLeast {
                    metric: Metric::QuizzesCompleted,
                    count: 1,
                },
            )
            .with_description("Complete your first quiz")
            .with_icon("🎯"),
            Badge::new(
                "quick-thinker",
                "Quick Thinker",
                Rarity::Rare,
                BadgeRule::CountAtLeast {
                    metric: Metric::FastAnswers,
                    count: 10,
                },
            )
            .with_description("Answer 10 questions correctly before the clock runs low")
            .with_icon("⚡"),
            Badge::new(
                "math-wizard",
                "Math Wizard",
                Rarity::Epic,
                BadgeRule::SubjectCompletedAtLeast {
                    subject: "math".into(),
                    count: math_quiz_count.max(1),
                },
            )
            .with_description("Master all math quizzes")
            .with_icon("🧙"),
            Badge::new(
                "perfect-score",
                "Perfect Score",
                Rarity::Rare,
                BadgeRule::CountAtLeast {
                    metric: Metric::PerfectScores,
                    count: 1,
                },
            )
            .with_description("Get 100% on any quiz")
            .with_icon("💯"),
            Badge::new(
                "streak-master",
                "Streak Master",
                Rarity::Legendary,
                BadgeRule::StreakAtLeast { days: 30 },
            )
            .with_description("Maintain a 30-day streak")
            .with_icon("🔥"),
            Badge::new(
                "scholar",
                "Scholar",
                Rarity::Epic,
                BadgeRule::CountAtLeast {
                    metric: Metric::QuizzesCompleted,
                    count: 50,
                },
            )
            .with_description("Complete 50 quizzes")
            .with_icon("📚"),
        ];
        Self { badges }
    }

    #[must_use]
    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.badges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    /// Looks up a badge by id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no badge has that id.
    pub fn get(&self, badge_id: &str) -> Result<&Badge, DomainError> {
        self.badges
            .iter()
            .find(|badge| badge.id == badge_id)
            .ok_or_else(|| DomainError::NotFound(format!("badge {badge_id}")))
    }

    /// Badges whose rule holds and which are not already earned, in catalog order.
    pub fn evaluate<'c, V>(
        &'c self,
        facts: &BadgeFacts<'_>,
        earned: &BTreeMap<String, V>,
    ) -> Vec<&'c Badge> {
        self.badges
            .iter()
            .filter(|badge| !earned.contains_key(&badge.id) && badge.rule.holds(facts))
            .collect()
    }

    /// Gallery view of the catalog for a player's earned badges.
    #[must_use]
    pub fn gallery(&self, earned: &BTreeMap<String, DateTime<Utc>>) -> BadgeGallery {
        let entries: Vec<GalleryEntry> = self
            .badges
            .iter()
            .map(|badge| GalleryEntry {
                badge: badge.clone(),
                earned: earned.contains_key(&badge.id),
                earned_at: earned.get(&badge.id).copied(),
            })
            .collect();
        BadgeGallery {
            earned: entries.iter().filter(|entry| entry.earned).count(),
            total: entries.len(),
            entries,
        }
    }
}

fn validate_badges(badges: &[Badge]) -> Result<(), DomainError> {
    let mut seen = HashSet::new();
    for badge in badges {
        if badge.id.trim().is_empty() {
            return Err(DomainError::InvalidArgument("badge id must not be blank".into()));
        }
        if !seen.insert(badge.id.as_str()) {
            return Err(DomainError::InvalidArgument(format!(
                "duplicate badge id {}",
                badge.id
            )));
        }
        badge.rule.validate()?;
    }
    Ok(())
}

impl TryFrom<Vec<Badge>> for BadgeCatalog {
    type Error = DomainError;

    fn try_from(badges: Vec<Badge>) -> Result<Self, Self::Error> {
        Self::new(badges)
    }
}

impl From<BadgeCatalog> for Vec<Badge> {
    fn from(catalog: BadgeCatalog) -> Self {
        catalog.badges
    }
}
