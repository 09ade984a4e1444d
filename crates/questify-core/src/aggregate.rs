//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;
use crate::repository::StoredEvent;

/// An event-sourced aggregate.
///
/// `version` counts persisted events only. Events staged by a domain
/// operation stay in `uncommitted_events` until the host appends them at
/// `version()` and calls `clear_uncommitted_events`.
pub trait AggregateRoot: Send + Sync {
    type Event: DomainEvent;

    fn aggregate_id(&self) -> Uuid;

    /// Number of persisted events folded into this aggregate.
    fn version(&self) -> i64;

    /// Folds a persisted event into state during reconstitution.
    fn apply(&mut self, event: &Self::Event);

    /// Events produced by domain operations but not yet persisted.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Marks staged events as persisted, advancing the version.
    fn clear_uncommitted_events(&mut self);

    /// Sequence number the next staged event will carry.
    fn next_sequence_number(&self) -> i64 {
        let staged = i64::try_from(self.uncommitted_events().len()).unwrap_or(i64::MAX);
        self.version().saturating_add(staged).saturating_add(1)
    }

    /// The staged events in stored form, ready to append at `version()`.
    fn pending_stored_events(&self) -> Vec<StoredEvent> {
        self.uncommitted_events()
            .iter()
            .map(StoredEvent::from_event)
            .collect()
    }
}
