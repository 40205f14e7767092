//! Error types for docent.

use thiserror::Error;

/// Result type for all docent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by contexts, entity sets and the population engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal problem while constructing a data context.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the misconfiguration.
        message: String,
    },

    /// Invalid per-call input, raised before any I/O.
    #[error("{message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// An underlying driver operation rejected. The cause is discarded
    /// and logged at debug level instead.
    #[error("failed to {action} data")]
    Query {
        /// The entity-set operation that failed.
        action: &'static str,
    },

    /// An entity could not be (de)serialized; covers both the wrap of raw
    /// documents and the encode path of `save`/`insert_many`.
    #[error("failed to (de)serialize document: {message}")]
    Decode {
        /// Description of the codec failure.
        message: String,
    },
}

impl Error {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a query failure for the given action.
    pub fn query(action: &'static str) -> Self {
        Self::Query { action }
    }
}

impl From<mongodb::bson::de::Error> for Error {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<mongodb::bson::ser::Error> for Error {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// Translates a driver failure into the uniform query error, logging the
/// discarded cause.
pub(crate) fn query_failed(action: &'static str, cause: impl std::fmt::Display) -> Error {
    tracing::debug!(action, %cause, "driver operation failed");
    Error::query(action)
}

#[cfg(test)]
mod tests {
    use super::Error;
    use mongodb::bson::{self, Bson};

    #[test]
    fn codec_failures_share_one_wording() {
        // Encode direction: a scalar is not a document.
        let encode: Error = bson::to_document(&1_i32).unwrap_err().into();
        assert!(matches!(encode, Error::Decode { .. }));
        assert!(encode.to_string().starts_with("failed to (de)serialize document"));

        // Decode direction: an integer is not a string.
        let decode: Error = bson::from_bson::<String>(Bson::Int32(1)).unwrap_err().into();
        assert!(matches!(decode, Error::Decode { .. }));
        assert!(decode.to_string().starts_with("failed to (de)serialize document"));
    }
}
