//! Error types
//!
//! Production services and test doubles report failures through the same
//! [`Error`] so callers can branch on provider codes (404, 409) identically.

use crate::meta::{GenerationError, Version};
use thiserror::Error;

/// HTTP status the provider uses for a missing resource.
pub const NOT_FOUND: u16 = 404;
/// HTTP status the provider uses for an already existing resource.
pub const CONFLICT: u16 = 409;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed resource locator {url:?}: {reason}")]
    MalformedLocator { url: String, reason: String },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("provider error {code}: {message}")]
    Provider { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid key {key} for {service}")]
    InvalidKey { key: String, service: String },

    #[error("{service} has no method {method:?}")]
    UnknownMethod { service: String, method: String },

    #[error("{service}.{method}: expected {expected} arguments, got {got}")]
    InvalidArguments {
        service: String,
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("no {version} service {service:?} in the catalog")]
    UnknownService { version: Version, service: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("context cancelled")]
    Cancelled,
}

/// Result type for cloud operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::Provider {
            code: NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Error::Provider {
            code: CONFLICT,
            message: message.into(),
        }
    }

    /// Provider status code, if the provider reported one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Provider { code, .. } => Some(*code),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = Error::not_found("MockFirewalls Key{\"abc\"} not found");
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some(404));
        assert_eq!(err.to_string(), "provider error 404: MockFirewalls Key{\"abc\"} not found");
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::already_exists("x").code(), Some(409));
        assert_eq!(Error::Cancelled.code(), None);
        assert!(!Error::Cancelled.is_not_found());
    }
}
