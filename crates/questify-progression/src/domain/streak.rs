//! Daily activity streaks.
//!
//! Dates are calendar days already resolved by the host's
//! [`DayBoundary`](questify_core::clock::DayBoundary); the tracker never looks
//! at instants or timezones itself.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, TimeDelta};
use questify_core::error::DomainError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of most recent days whose activity is remembered for the week view.
const RECENT_WINDOW_DAYS: i64 = 14;

/// How a single `record_activity` call moved the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreakChange {
    /// Same day as the last recorded activity.
    Unchanged,
    /// First activity ever recorded.
    Started,
    /// Activity on the day after the last one.
    Extended,
    /// Activity after one or more missed days; the streak restarts at 1.
    Reset,
}

/// Result of recording one day of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakDelta {
    /// What happened to the current streak.
    pub change: StreakChange,
    /// Current streak before the call.
    pub previous: u32,
    /// Current streak after the call.
    pub current: u32,
    /// Longest streak after the call.
    pub longest: u32,
}

impl StreakDelta {
    /// True when the call left the streak exactly as it was.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.change == StreakChange::Unchanged
    }

    /// Signed change of the current streak length.
    #[must_use]
    pub fn difference(&self) -> i64 {
        i64::from(self.current) - i64::from(self.previous)
    }
}

/// Current and longest run of consecutive active days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Streak {
    current: u32,
    longest: u32,
    last_activity: Option<NaiveDate>,
    recent: BTreeSet<NaiveDate>,
}

impl Streak {
    /// Length of the run ending on the last activity date.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Longest run ever recorded.
    #[must_use]
    pub fn longest(&self) -> u32 {
        self.longest
    }

    /// The last day with recorded activity.
    #[must_use]
    pub fn last_activity(&self) -> Option<NaiveDate> {
        self.last_activity
    }

    /// Current streak as seen on `today`: zero once a whole day has been missed.
    #[must_use]
    pub fn current_as_of(&self, today: NaiveDate) -> u32 {
        match self.last_activity {
            Some(last) if today - last <= TimeDelta::days(1) => self.current,
            _ => 0,
        }
    }

    /// Records activity on `date` and returns the updated streak with its delta.
    ///
    /// Recording the same day twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::OutOfOrderActivity` if `date` is before the last
    /// recorded activity.
    pub fn record_activity(&self, date: NaiveDate) -> Result<(Self, StreakDelta), DomainError> {
        let (change, current) = match self.last_activity {
            None => (StreakChange::Started, 1),
            Some(last) if date < last => {
                return Err(DomainError::OutOfOrderActivity {
                    last,
                    attempted: date,
                });
            }
            Some(last) if date == last => (StreakChange::Unchanged, self.current),
            Some(last) if date - last == TimeDelta::days(1) => {
                (StreakChange::Extended, self.current.saturating_add(1))
            }
            Some(_) => (StreakChange::Reset, 1),
        };
        let longest = self.longest.max(current);
        let delta = StreakDelta {
            change,
            previous: self.current,
            current,
            longest,
        };
        if change != StreakChange::Unchanged {
            debug!(%date, ?change, current, longest, "streak updated");
        }
        Ok((self.with_recorded(date, current, longest), delta))
    }

    /// Returns the streak as it stands after activity on `date` left it at
    /// `current`/`longest`. Used when folding persisted events.
    pub(crate) fn with_recorded(&self, date: NaiveDate, current: u32, longest: u32) -> Self {
        let mut recent = self.recent.clone();
        recent.insert(date);
        let horizon = date
            .checked_sub_signed(TimeDelta::days(RECENT_WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MIN);
        recent.retain(|d| *d >= horizon);
        Self {
            current,
            longest: self.longest.max(longest),
            last_activity: Some(self.last_activity.map_or(date, |last| last.max(date))),
            recent,
        }
    }

    /// Whether any activity was recorded on `date` within the remembered window.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.recent.contains(&date)
    }

    /// Activity for the Monday-to-Sunday week containing `reference`.
    #[must_use]
    pub fn week_activity(&self, reference: NaiveDate) -> [bool; 7] {
        let weekday = i64::from(reference.weekday().num_days_from_monday());
        std::array::from_fn(|offset| {
            // offset < 7
            #[allow(clippy::cast_possible_wrap)]
            let shift = TimeDelta::days(offset as i64 - weekday);
            reference
                .checked_add_signed(shift)
                .is_some_and(|day| self.is_active_on(day))
        })
    }
}
