//! Host configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use questify_core::clock::DayBoundary;
use questify_progression::domain::engine::DEFAULT_FAST_ANSWER_SECS;
use questify_quiz::domain::session::DEFAULT_QUESTION_DEADLINE_SECS;

use crate::error::AppError;

const DEFAULT_SWEEP_INTERVAL_MS: u64 = 250;

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// `QUESTIFY_CATALOG`
    pub catalog_path: Option<PathBuf>,
    /// `QUESTIFY_SCRIPT`
    pub script_path: Option<PathBuf>,
    /// `QUESTIFY_UTC_OFFSET_MINUTES`
    pub day_boundary: DayBoundary,
    /// `QUESTIFY_QUESTION_DEADLINE_SECS`
    pub question_deadline: TimeDelta,
    /// `QUESTIFY_SWEEP_INTERVAL_MS`
    pub sweep_interval: Duration,
    /// `QUESTIFY_FAST_ANSWER_SECS`
    pub fast_answer_threshold: TimeDelta,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            script_path: None,
            day_boundary: DayBoundary::utc(),
            question_deadline: TimeDelta::seconds(DEFAULT_QUESTION_DEADLINE_SECS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
            fast_answer_threshold: TimeDelta::seconds(DEFAULT_FAST_ANSWER_SECS),
        }
    }
}

impl HostConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, so tests need not touch the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let offset_minutes: i32 = parse_or(&lookup, "QUESTIFY_UTC_OFFSET_MINUTES", 0)?;
        let day_boundary = DayBoundary::from_offset_minutes(offset_minutes)
            .map_err(|e| AppError::Config(format!("QUESTIFY_UTC_OFFSET_MINUTES: {e}")))?;

        let deadline_secs: i64 = parse_or(
            &lookup,
            "QUESTIFY_QUESTION_DEADLINE_SECS",
            DEFAULT_QUESTION_DEADLINE_SECS,
        )?;
        if deadline_secs <= 0 {
            return Err(AppError::Config(
                "QUESTIFY_QUESTION_DEADLINE_SECS must be positive".into(),
            ));
        }

        let sweep_ms: u64 = parse_or(&lookup, "QUESTIFY_SWEEP_INTERVAL_MS", DEFAULT_SWEEP_INTERVAL_MS)?;
        if sweep_ms == 0 {
            return Err(AppError::Config(
                "QUESTIFY_SWEEP_INTERVAL_MS must be positive".into(),
            ));
        }

        let fast_secs: i64 = parse_or(&lookup, "QUESTIFY_FAST_ANSWER_SECS", DEFAULT_FAST_ANSWER_SECS)?;

        Ok(Self {
            catalog_path: lookup("QUESTIFY_CATALOG").map(PathBuf::from),
            script_path: lookup("QUESTIFY_SCRIPT").map(PathBuf::from),
            day_boundary,
            question_deadline: TimeDelta::seconds(deadline_secs),
            sweep_interval: Duration::from_millis(sweep_ms),
            fast_answer_threshold: TimeDelta::seconds(fast_secs.max(0)),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a number: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<HostConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        HostConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config, HostConfig::default());
        assert_eq!(config.question_deadline, TimeDelta::seconds(30));
    }

    #[test]
    fn test_reads_every_variable() {
        let config = config_from(&[
            ("QUESTIFY_CATALOG", "demos/catalog.yaml"),
            ("QUESTIFY_SCRIPT", "demos/script.yaml"),
            ("QUESTIFY_UTC_OFFSET_MINUTES", "-300"),
            ("QUESTIFY_QUESTION_DEADLINE_SECS", "45"),
            ("QUESTIFY_SWEEP_INTERVAL_MS", "100"),
            ("QUESTIFY_FAST_ANSWER_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(config.catalog_path, Some(PathBuf::from("demos/catalog.yaml")));
        assert_eq!(config.script_path, Some(PathBuf::from("demos/script.yaml")));
        assert_eq!(config.day_boundary, DayBoundary::from_offset_minutes(-300).unwrap());
        assert_eq!(config.question_deadline, TimeDelta::seconds(45));
        assert_eq!(config.sweep_interval, Duration::from_millis(100));
        assert_eq!(config.fast_answer_threshold, TimeDelta::seconds(5));
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let result = config_from(&[("QUESTIFY_QUESTION_DEADLINE_SECS", "soon")]);

        match result.unwrap_err() {
            AppError::Config(msg) => assert!(msg.starts_with("QUESTIFY_QUESTION_DEADLINE_SECS")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_deadline_is_rejected() {
        assert!(matches!(
            config_from(&[("QUESTIFY_QUESTION_DEADLINE_SECS", "0")]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_offset_beyond_a_day_is_rejected() {
        assert!(matches!(
            config_from(&[("QUESTIFY_UTC_OFFSET_MINUTES", "1440")]),
            Err(AppError::Config(_))
        ));
    }
}
