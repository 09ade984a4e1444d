//! Clock and calendar-day abstractions for determinism.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::DomainError;

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Host-supplied policy for where one calendar day ends and the next begins.
///
/// Streaks are counted in whole days of this fixed offset. The engine never
/// guesses a timezone; hosts construct one of these explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl DayBoundary {
    /// Days roll over at midnight UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Days roll over at midnight of the given UTC offset, in minutes east.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the offset is a day or more.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, DomainError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| {
                DomainError::InvalidArgument(format!("utc offset out of range: {minutes} minutes"))
            })
    }

    /// Returns the configured offset.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Returns the calendar date an instant falls on under this policy.
    #[must_use]
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_boundary_uses_utc_date() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 30, 0).unwrap();

        assert_eq!(
            DayBoundary::utc().date_of(at),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_positive_offset_rolls_date_forward() {
        let boundary = DayBoundary::from_offset_minutes(60).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 30, 0).unwrap();

        assert_eq!(
            boundary.date_of(at),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
    }

    #[test]
    fn test_negative_offset_keeps_previous_date() {
        let boundary = DayBoundary::from_offset_minutes(-300).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 2, 0, 0).unwrap();

        assert_eq!(
            boundary.date_of(at),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_offset_of_a_full_day_is_rejected() {
        let result = DayBoundary::from_offset_minutes(24 * 60);

        match result.unwrap_err() {
            DomainError::InvalidArgument(msg) => assert!(msg.contains("1440")),
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }
}
