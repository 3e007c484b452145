//! Error types for the OpenAPI bridge

use std::io;

use thiserror::Error;

use crate::compiler::{Classified, Outcome};

/// Result type alias for the bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Spec document error (malformed document, missing base URL)
    #[error("Spec error: {0}")]
    Spec(String),

    /// Unknown operation name
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    /// Unknown resource name
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Classified API failure raised by resource reads
    #[error("{message}")]
    Api {
        /// Outcome category the HTTP status mapped to
        outcome: Outcome,
        /// HTTP status, absent for transport-level failures
        status: Option<u16>,
        /// Formatted `"{category} ({status}): {details}"` message
        message: String,
    },

    /// Transport error (connection failure, deadline exceeded)
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a classified API error for a resource read failure
    #[must_use]
    pub fn api(classified: &Classified) -> Self {
        Self::Api {
            outcome: classified.outcome,
            status: classified.status,
            message: classified.resource_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_carries_category_and_status() {
        let classified = crate::compiler::classify(Some(403), Some("Forbidden"));
        let err = Error::api(&classified);
        assert_eq!(err.to_string(), "AuthFailure (403): Forbidden");
        assert!(matches!(
            err,
            Error::Api {
                outcome: Outcome::AuthFailure,
                status: Some(403),
                ..
            }
        ));
    }

    #[test]
    fn io_error_converts() {
        let err: Error = io::Error::other("boom").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
