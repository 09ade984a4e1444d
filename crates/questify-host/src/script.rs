//! Scripted play-throughs for the demo binary.
//!
//! A script lists players and the sessions they play. Sessions run in day
//! order across all players, on a manual clock that starts at `start` and
//! only moves forward:
//!
//! ```yaml
//! start: 2026-03-02T09:00:00Z
//! players:
//!   - name: Ada
//!     sessions:
//!       - quiz: algebra-basics
//!         day: 0
//!         answers:
//!           - { option: b, seconds: 4 }
//!           - {}                      # no option: the question times out
//! ```

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use questify_core::clock::Clock;

use crate::clock::ManualClock;
use crate::error::{AppError, ErrorBody};
use crate::host::{NextStep, QuestifyHost};

const DEFAULT_ANSWER_SECS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayScript {
    pub start: DateTime<Utc>,
    pub players: Vec<ScriptedPlayer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptedPlayer {
    pub name: String,
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub sessions: Vec<ScriptedSession>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptedSession {
    pub quiz: String,
    /// Days after `start`.
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub answers: Vec<ScriptedAnswer>,
    /// Abandon the session once this many questions have been answered.
    #[serde(default)]
    pub cancel_after: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptedAnswer {
    /// `None` lets the question time out.
    #[serde(default)]
    pub option: Option<String>,
    /// Thinking time before answering.
    #[serde(default = "default_answer_secs")]
    pub seconds: u32,
}

fn default_answer_secs() -> u32 {
    DEFAULT_ANSWER_SECS
}

/// Parses a play script.
///
/// # Errors
///
/// Returns `AppError::Yaml` for malformed YAML or unknown fields.
pub fn parse_script(yaml: &str) -> Result<PlayScript, AppError> {
    serde_yaml::from_str(yaml).map_err(|source| AppError::Yaml {
        file: "script",
        source,
    })
}

/// Reads and parses a play script file.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read, otherwise as
/// [`parse_script`].
pub fn load_script(path: &Path) -> Result<PlayScript, AppError> {
    let yaml = std::fs::read_to_string(path)?;
    let script = parse_script(&yaml)?;
    info!(path = %path.display(), players = script.players.len(), "script loaded");
    Ok(script)
}

/// One line of demo output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Line<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    player: Option<&'a str>,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quiz: Option<&'a str>,
    data: serde_json::Value,
}

/// Drives `host` through `script`, writing one JSON line per step to `out`.
///
/// Domain errors are reported as `error` lines and end only the session they
/// occurred in. Returns the id assigned to each scripted player, in script
/// order.
///
/// # Errors
///
/// Returns `AppError::Domain` if a player cannot be registered, and
/// `AppError::Io` or `AppError::Json` if output fails.
pub async fn run_script(
    host: &QuestifyHost,
    clock: &ManualClock,
    script: &PlayScript,
    question_deadline: TimeDelta,
    out: &mut impl Write,
) -> Result<Vec<Uuid>, AppError> {
    clock.set(script.start);

    let mut player_ids = Vec::with_capacity(script.players.len());
    for player in &script.players {
        let player_id = player.id.unwrap_or_else(Uuid::new_v4);
        host.register_player(player_id, &player.name).await?;
        emit(out, player.name.as_str(), "registered", None, &json!({ "playerId": player_id }))?;
        player_ids.push(player_id);
    }

    let mut agenda: Vec<(u32, usize, &ScriptedSession)> = script
        .players
        .iter()
        .enumerate()
        .flat_map(|(index, player)| player.sessions.iter().map(move |s| (s.day, index, s)))
        .collect();
    agenda.sort_by_key(|(day, _, _)| *day);

    for (day, index, session) in agenda {
        let day_start = script.start + TimeDelta::days(i64::from(day));
        if day_start > clock.now() {
            clock.set(day_start);
        }
        let name = script.players[index].name.as_str();
        if let Err(e) = play_session(
            host,
            clock,
            player_ids[index],
            name,
            session,
            question_deadline,
            out,
        )
        .await
        {
            match e {
                AppError::Domain(domain) => {
                    warn!(player = name, quiz = %session.quiz, error = %domain, "scripted session failed");
                    emit(out, name, "error", Some(session.quiz.as_str()), &ErrorBody::from(&domain))?;
                }
                other => return Err(other),
            }
        }
    }

    Ok(player_ids)
}

/// Writes each player's final state and the leaderboard.
///
/// # Errors
///
/// Returns `AppError::Domain` if a player cannot be loaded, and
/// `AppError::Io` or `AppError::Json` if output fails.
pub async fn write_report(
    host: &QuestifyHost,
    player_ids: &[Uuid],
    out: &mut impl Write,
) -> Result<(), AppError> {
    for &player_id in player_ids {
        let player = host.player(player_id).await?;
        let gallery = host.badge_gallery(player_id).await?;
        let catalog = host.catalog_view(player_id).await?;
        emit(
            out,
            player.display_name.as_str(),
            "summary",
            None,
            &json!({ "player": player, "badges": gallery, "catalog": catalog }),
        )?;
    }
    emit(out, None, "leaderboard", None, &host.leaderboard().await?)
}

async fn play_session(
    host: &QuestifyHost,
    clock: &ManualClock,
    player_id: Uuid,
    name: &str,
    script: &ScriptedSession,
    question_deadline: TimeDelta,
    out: &mut impl Write,
) -> Result<(), AppError> {
    let quiz = Some(script.quiz.as_str());
    let view = host.start_session(player_id, &script.quiz).await?;
    let session_id = view.session_id;
    emit(out, name, "started", quiz, &view)?;

    let result = play_answers(host, clock, session_id, name, script, question_deadline, out).await;
    if result.is_err() && host.session(session_id).is_ok() {
        host.cancel_session(session_id)?;
    }
    result
}

async fn play_answers(
    host: &QuestifyHost,
    clock: &ManualClock,
    session_id: Uuid,
    name: &str,
    script: &ScriptedSession,
    question_deadline: TimeDelta,
    out: &mut impl Write,
) -> Result<(), AppError> {
    let quiz = Some(script.quiz.as_str());
    let mut answers = script.answers.iter();
    let mut answered = 0;
    loop {
        let answer = match answers.next() {
            Some(answer) if script.cancel_after != Some(answered) => answer,
            _ => {
                host.cancel_session(session_id)?;
                emit(out, name, "abandoned", quiz, &json!({ "answered": answered }))?;
                return Ok(());
            }
        };

        match &answer.option {
            Some(option) => {
                clock.advance(TimeDelta::seconds(i64::from(answer.seconds)));
                let outcome = host.submit_answer(session_id, option)?;
                emit(out, name, "answered", quiz, &outcome)?;
            }
            None => {
                // The background sweeper may get there first.
                clock.advance(question_deadline + TimeDelta::seconds(1));
                host.sweep_expired(clock.now())?;
                if let Some(outcome) = host.session(session_id)?.last_outcome {
                    emit(out, name, "timedOut", quiz, &outcome)?;
                }
            }
        }
        answered += 1;

        if let finished @ NextStep::Finished { .. } = host.next_question(session_id).await? {
            emit(out, name, "finished", quiz, &finished)?;
            return Ok(());
        }
    }
}

fn emit<'a>(
    out: &mut impl Write,
    player: impl Into<Option<&'a str>>,
    event: &str,
    quiz: Option<&str>,
    data: &impl Serialize,
) -> Result<(), AppError> {
    let line = Line {
        player: player.into(),
        event,
        quiz,
        data: serde_json::to_value(data)?,
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}
