//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Opaque identifier of one asynchronous unit of work.
///
/// The inner String is private so blank IDs can be rejected in
/// [`CorrelationId::try_new`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a correlation ID, rejecting blank input.
    ///
    /// # Errors
    /// Returns [`DomainError::BlankCorrelationId`] if `id` is empty or
    /// whitespace only.
    pub fn try_new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::BlankCorrelationId);
        }
        Ok(Self(id))
    }

    /// Get the correlation ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a value read back from storage without re-validating it.
    pub(crate) fn from_stored(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for CorrelationId {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::try_new(s)
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_new(s)
    }
}

/// Unique identifier of a registered join.
///
/// Generated as UUID v4 for new joins, or constructed from an existing
/// string for persistence/deserialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitInstanceId(String);

impl WaitInstanceId {
    /// Create a new `WaitInstanceId` with a generated UUID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the wait instance ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WaitInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WaitInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WaitInstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WaitInstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
