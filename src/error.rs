use thiserror::Error;

use crate::domain::error::DomainError;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures raised while resolving or running a wait callback.
///
/// These never reach the producer that called `notify`; the dispatcher
/// records them as a [`WaitInstanceError`](crate::domain::failure::WaitInstanceError).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback failed: {0}")]
    Failed(String),

    #[error("no callback registered for kind '{0}'")]
    UnknownKind(String),

    #[error("callback panicked: {0}")]
    Panicked(String),
}

impl CallbackError {
    /// Convenience constructor for a plain failure message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_transparent() {
        let err: Error = DomainError::EmptyCorrelationIds.into();
        assert_eq!(
            err.to_string(),
            "invalid argument: at least one correlation id is required"
        );
    }

    #[test]
    fn config_error_formats_field() {
        let err: Error = ConfigError::InvalidValue {
            field: "lease_secs",
            reason: "must be greater than 0".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid value for lease_secs: must be greater than 0"
        );
    }

    #[test]
    fn callback_error_unknown_kind_names_the_kind() {
        let err = CallbackError::UnknownKind("resume".into());
        assert_eq!(err.to_string(), "no callback registered for kind 'resume'");
    }
}
