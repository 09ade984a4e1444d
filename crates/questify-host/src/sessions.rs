//! Lifecycle-scoped registry of live quiz sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use questify_core::error::DomainError;
use questify_quiz::domain::session::{QuizSession, SessionSummary};
use uuid::Uuid;

/// Live sessions keyed by session id, with at most one per player.
///
/// A finished session stays here, holding its summary, until its progression
/// commit succeeds. An abandoned session is removed at once.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, QuizSession>,
    by_player: HashMap<Uuid, Uuid>,
    uncommitted: HashMap<Uuid, SessionSummary>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` if the player already has
    /// a live session.
    pub fn insert(&mut self, session: QuizSession) -> Result<(), DomainError> {
        if let Some(active) = self.by_player.get(&session.player_id()) {
            return Err(DomainError::invalid_transition(
                format!("session {active} is active"),
                "start a session",
            ));
        }
        self.by_player.insert(session.player_id(), session.id());
        self.sessions.insert(session.id(), session);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown session.
    pub fn get(&self, session_id: Uuid) -> Result<&QuizSession, DomainError> {
        self.sessions
            .get(&session_id)
            .ok_or_else(|| DomainError::NotFound(format!("session {session_id}")))
    }

    /// # Errors
    ///
    /// Returns `DomainError::NotFound` for an unknown session.
    pub fn get_mut(&mut self, session_id: Uuid) -> Result<&mut QuizSession, DomainError> {
        self.sessions
            .get_mut(&session_id)
            .ok_or_else(|| DomainError::NotFound(format!("session {session_id}")))
    }

    /// Removes a session and frees its player.
    pub fn remove(&mut self, session_id: Uuid) -> Option<QuizSession> {
        let session = self.sessions.remove(&session_id)?;
        self.by_player.remove(&session.player_id());
        self.uncommitted.remove(&session_id);
        Some(session)
    }

    /// Keeps a finished session's summary until it has been committed.
    pub fn hold_uncommitted(&mut self, summary: SessionSummary) {
        self.uncommitted.insert(summary.session_id, summary);
    }

    /// The summary of a finished session whose commit has not yet succeeded.
    #[must_use]
    pub fn uncommitted(&self, session_id: Uuid) -> Option<&SessionSummary> {
        self.uncommitted.get(&session_id)
    }

    /// The player's live session id, if any.
    #[must_use]
    pub fn active_for(&self, player_id: Uuid) -> Option<Uuid> {
        self.by_player.get(&player_id).copied()
    }

    /// Ids of sessions whose current question deadline has passed at `now`,
    /// sorted for a stable sweep order.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .sessions
            .values()
            .filter(|session| session.is_expired(now))
            .map(QuizSession::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
