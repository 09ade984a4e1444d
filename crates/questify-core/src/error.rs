//! Domain error types.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Every invalid call into the engine yields one of these; none of them is
/// fatal and the caller's state is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Malformed input such as negative XP or an empty quiz.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        /// Human-readable name of the current state.
        state: String,
        /// The rejected operation.
        operation: &'static str,
    },

    /// An activity date earlier than the last recorded one.
    #[error("activity on {attempted} is before last recorded activity on {last}")]
    OutOfOrderActivity {
        /// The most recent recorded activity date.
        last: NaiveDate,
        /// The rejected activity date.
        attempted: NaiveDate,
    },

    /// An unknown option, question, quiz or badge identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Builds an `InvalidStateTransition` from anything that displays as a state.
    pub fn invalid_transition(state: impl std::fmt::Display, operation: &'static str) -> Self {
        Self::InvalidStateTransition {
            state: state.to_string(),
            operation,
        }
    }

    /// Machine-readable error code for host-side feedback mapping.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::OutOfOrderActivity { .. } => "out_of_order_activity",
            Self::NotFound(_) => "not_found",
            Self::AggregateNotFound(_) => "aggregate_not_found",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::Infrastructure(_) => "infrastructure_error",
        }
    }
}
