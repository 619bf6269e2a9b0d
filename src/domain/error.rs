//! Domain validation errors for wait/notify types.
//!
//! These errors are returned at the API boundary when a caller hands the
//! engine input that violates a domain invariant.
//!
//! # Examples
//!
//! ```
//! use waitnotify::domain::error::DomainError;
//! use waitnotify::domain::id::CorrelationId;
//!
//! let result = CorrelationId::try_new("   ");
//! assert!(matches!(result, Err(DomainError::BlankCorrelationId)));
//! ```

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A join must wait on at least one correlation ID.
    #[error("invalid argument: at least one correlation id is required")]
    EmptyCorrelationIds,

    /// Correlation IDs must contain at least one non-whitespace character.
    #[error("invalid argument: correlation id must not be blank")]
    BlankCorrelationId,

    /// Publisher topics must contain at least one non-whitespace character.
    #[error("invalid argument: publisher must not be blank")]
    BlankPublisher,

    /// A persisted status string did not match any known status.
    #[error("unknown wait status '{value}'")]
    InvalidStatus {
        /// The unrecognised value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_status_includes_value() {
        let err = DomainError::InvalidStatus {
            value: "PENDING".into(),
        };
        assert_eq!(err.to_string(), "unknown wait status 'PENDING'");
    }
}
