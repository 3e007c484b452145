//! HTTP status to outcome classification
//!
//! Maps the status (and optional error payload) of a failed call to one of a
//! small closed set of categories the calling agent can reason about. 404 is
//! deliberately classified as a validation failure: the caller supplied a bad
//! identifier or path, the upstream itself is fine.

use std::fmt;

/// Closed set of failure categories surfaced to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The caller's arguments were rejected (400, 404)
    ValidationFailure,
    /// Credentials missing or refused (401, 403)
    AuthFailure,
    /// The method is not supported on this path (405)
    MethodUnsupported,
    /// The upstream or the transport failed (5xx, timeouts, anything else)
    UpstreamFailure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValidationFailure => "ValidationFailure",
            Self::AuthFailure => "AuthFailure",
            Self::MethodUnsupported => "MethodUnsupported",
            Self::UpstreamFailure => "UpstreamFailure",
        };
        f.write_str(name)
    }
}

/// A classified failure with its formatted messages
#[derive(Debug, Clone)]
pub struct Classified {
    /// Mapped outcome category
    pub outcome: Outcome,
    /// HTTP status, absent for transport-level failures
    pub status: Option<u16>,
    /// Payload text (truncated) or a default
    pub details: String,
}

impl Classified {
    /// Message shape used by operation soft-failure results
    #[must_use]
    pub fn operation_message(&self) -> String {
        format!("API Error ({}): {}", self.status_text(), self.details)
    }

    /// Message shape used by raised resource-read errors
    #[must_use]
    pub fn resource_message(&self) -> String {
        format!("{} ({}): {}", self.outcome, self.status_text(), self.details)
    }

    fn status_text(&self) -> String {
        self.status
            .map_or_else(|| "transport".to_string(), |s| s.to_string())
    }
}

/// Classify an HTTP status and optional error payload.
///
/// Priority order, first match wins; anything unmapped (including a missing
/// status from a transport failure) falls back to [`Outcome::UpstreamFailure`].
#[must_use]
pub fn classify(status: Option<u16>, payload: Option<&str>) -> Classified {
    let outcome = match status {
        Some(400 | 404) => Outcome::ValidationFailure,
        Some(401 | 403) => Outcome::AuthFailure,
        Some(405) => Outcome::MethodUnsupported,
        Some(s) if s >= 500 => Outcome::UpstreamFailure,
        _ => Outcome::UpstreamFailure,
    };

    // Truncate so oversized upstream payloads don't flood the agent.
    let details = payload
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map_or_else(|| "Unknown error".to_string(), |p| p.chars().take(500).collect());

    Classified {
        outcome,
        status,
        details,
    }
}
