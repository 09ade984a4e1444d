//! Questify host: error types.

use questify_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the host process.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The catalog or script file could not be parsed.
    #[error("invalid {file}: {source}")]
    Yaml {
        /// Which file failed.
        file: &'static str,
        /// The parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Output serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine rejected an operation.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// JSON body describing a rejected operation, for UI feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl From<&DomainError> for ErrorBody {
    fn from(err: &DomainError) -> Self {
        Self {
            error: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_body_uses_domain_code() {
        let body = ErrorBody::from(&DomainError::invalid_transition("awaiting next", "submit an answer"));

        assert_eq!(body.error, "invalid_state_transition");
        assert_eq!(body.message, "cannot submit an answer while awaiting next");
    }

    #[test]
    fn test_error_body_for_missing_player() {
        let id = Uuid::new_v4();

        let body = ErrorBody::from(&DomainError::AggregateNotFound(id));

        assert_eq!(body.error, "aggregate_not_found");
        assert!(body.message.contains(&id.to_string()));
    }

    #[test]
    fn test_domain_error_converts_transparently() {
        let err = AppError::from(DomainError::NotFound("quiz x".into()));

        assert_eq!(err.to_string(), "not found: quiz x");
    }
}
