//! In-memory implementation of the `EventRepository` trait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use questify_core::error::DomainError;
use questify_core::repository::{EventRepository, StoredEvent};

/// Process-local event store with optimistic concurrency.
///
/// Each aggregate stream is a `Vec` whose length is its version; an append
/// succeeds only when the caller's expected version matches it.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: Mutex<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of every stream with at least one event, sorted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn aggregate_ids(&self) -> Result<Vec<Uuid>, DomainError> {
        let streams = self.lock()?;
        let mut ids: Vec<Uuid> = streams
            .iter()
            .filter(|(_, stream)| !stream.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Vec<StoredEvent>>>, DomainError> {
        self.streams
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("event store mutex poisoned: {e}")))
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.lock()?.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let mut streams = self.lock()?;
        let stream = streams.entry(aggregate_id).or_default();
        let actual = i64::try_from(stream.len())
            .map_err(|e| DomainError::Infrastructure(format!("stream too long: {e}")))?;
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        if let Some(wrong) = events.iter().find(|e| e.aggregate_id != aggregate_id) {
            return Err(DomainError::Infrastructure(format!(
                "event {} belongs to {}, not {aggregate_id}",
                wrong.event_id, wrong.aggregate_id
            )));
        }
        stream.extend_from_slice(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questify_test_support::fixed_instant;

    fn event(aggregate_id: Uuid, sequence_number: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: "progression.player_registered".into(),
            payload: serde_json::json!({}),
            sequence_number,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: fixed_instant(),
        }
    }

    #[tokio::test]
    async fn test_append_then_load_returns_events_in_order() {
        let repo = InMemoryEventRepository::new();
        let id = Uuid::new_v4();

        repo.append_events(id, 0, &[event(id, 1)]).await.unwrap();
        repo.append_events(id, 1, &[event(id, 2), event(id, 3)])
            .await
            .unwrap();

        let loaded = repo.load_events(id).await.unwrap();
        let sequence: Vec<i64> = loaded.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_concurrency_conflict() {
        let repo = InMemoryEventRepository::new();
        let id = Uuid::new_v4();
        repo.append_events(id, 0, &[event(id, 1)]).await.unwrap();

        let result = repo.append_events(id, 0, &[event(id, 1)]).await;

        match result.unwrap_err() {
            DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => {
                assert_eq!(aggregate_id, id);
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(repo.load_events(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_stream_loads_empty() {
        let repo = InMemoryEventRepository::new();

        assert!(repo.load_events(Uuid::new_v4()).await.unwrap().is_empty());
        assert!(repo.aggregate_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_for_another_stream_is_rejected() {
        let repo = InMemoryEventRepository::new();
        let id = Uuid::new_v4();

        let result = repo.append_events(id, 0, &[event(Uuid::new_v4(), 1)]).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
