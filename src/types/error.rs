//! Core error taxonomy.
//!
//! Every public operation returns `Result<T, CoreError>`. Errors are values
//! on the operation boundary; the core never panics on user input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error kind, mirrors the adapter-layer status code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller-supplied constraints violated.
    InvalidArgument,
    /// Unknown seed, cluster id, or snapshot.
    NotFound,
    /// Snapshot hash does not match the current graph; caller should rebuild.
    Stale,
    /// Deadline expired or explicit cancellation.
    Cancelled,
    /// Discovery rate limiter rejected the call.
    RateLimited,
    /// On-disk artifact failed validation.
    IntegrityError,
    /// Unexpected invariant violation.
    Internal,
}

impl ErrorKind {
    /// Stable string code for this kind, as carried in `CoreError::code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::Stale => "STALE",
            Self::Cancelled => "CANCELLED",
            Self::RateLimited => "RATE_LIMITED",
            Self::IntegrityError => "INTEGRITY_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A core operation error.
///
/// Carries a stable code, a human-readable message, and up to 10 offending
/// ids for `IntegrityError`/`InvalidArgument` per the error handling design.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CoreError {
    /// Error kind / stable code.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Up to 10 offending ids, when applicable.
    pub context_ids: Vec<String>,
}

impl CoreError {
    /// Construct a new error, clamping `context_ids` to at most 10 entries.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context_ids: Vec::new(),
        }
    }

    /// Attach offending ids, truncated to the first 10.
    pub fn with_context_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.context_ids = ids.into_iter().take(10).collect();
        self
    }

    /// Shorthand constructors, one per error kind.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn stale(old_hash: impl fmt::Display, new_hash: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Stale,
            format!("snapshot hash {old_hash} no longer matches graph hash {new_hash}"),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation was cancelled")
    }

    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Self::new(
            ErrorKind::RateLimited,
            format!("rate limit exceeded, retry after {retry_after_ms}ms"),
        )
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IntegrityError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// A non-fatal note attached to an otherwise-successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Stable machine-readable code, e.g. `"clamped_granularity"`.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_ids_clamp_to_ten() {
        let ids: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let err = CoreError::invalid_argument("too many").with_context_ids(ids);
        assert_eq!(err.context_ids.len(), 10);
    }

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(ErrorKind::Stale.code(), "STALE");
        assert_eq!(ErrorKind::RateLimited.code(), "RATE_LIMITED");
    }
}
