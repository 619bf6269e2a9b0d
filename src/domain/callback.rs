//! Persisted callback descriptions.
//!
//! A join stores *what* to run, not a function pointer: a `kind`
//! discriminator plus a JSON context. The host application resolves the
//! kind through its callback registry when the join completes, so callback
//! variants are owned by calling code rather than by the engine.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Serializable description of the handler to invoke for a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSpec {
    /// Discriminator resolved by the host's registry.
    pub kind: String,
    /// Handler-specific context captured at registration time.
    #[serde(default)]
    pub context: serde_json::Value,
}

impl CallbackSpec {
    /// Create a spec with no context.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a spec whose context is the JSON form of `context`.
    ///
    /// # Errors
    /// Returns an error if `context` cannot be serialized.
    pub fn with_context<T: Serialize>(kind: impl Into<String>, context: &T) -> Result<Self> {
        Ok(Self {
            kind: kind.into(),
            context: serde_json::to_value(context)?,
        })
    }

    /// Decode the stored context into a concrete type.
    ///
    /// # Errors
    /// Returns an error if the context does not match `T`.
    pub fn context_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.context.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Resume {
        execution_id: String,
        attempt: u32,
    }

    #[test]
    fn context_roundtrips_through_spec() {
        let resume = Resume {
            execution_id: "exec-1".into(),
            attempt: 2,
        };
        let spec = CallbackSpec::with_context("resume", &resume).unwrap();
        assert_eq!(spec.kind, "resume");
        assert_eq!(spec.context_as::<Resume>().unwrap(), resume);
    }

    #[test]
    fn missing_context_defaults_to_null() {
        let spec: CallbackSpec = serde_json::from_str(r#"{"kind":"log"}"#).unwrap();
        assert_eq!(spec, CallbackSpec::new("log"));
    }

    #[test]
    fn mismatched_context_is_an_error() {
        let spec = CallbackSpec::new("resume");
        assert!(spec.context_as::<Resume>().is_err());
    }
}
