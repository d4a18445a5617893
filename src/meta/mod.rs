//! Service metadata
//!
//! Describes every managed GCE resource type: its addressing topology, the API
//! tier it is exposed through and any methods beyond insert/get/list/delete.
//!
//! # Module Structure
//!
//! - [`key`] - Addressing keys (global, regional, zonal)
//! - [`schema`] - Static description of each tier's native service surface
//! - [`service`] - The service catalog
//! - [`method`] - Validation and signature synthesis for extra methods

pub mod key;
pub mod method;
pub mod schema;
pub mod service;

pub use key::{Key, KeyType, Scope};
pub use method::{Arg, Method, ReturnShape};
pub use service::{all_services, find_service, ServiceInfo};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// API tier of the compute service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Version {
    #[default]
    Ga,
    Alpha,
    Beta,
}

/// All tiers of the compute API.
pub const ALL_VERSIONS: [Version; 3] = [Version::Ga, Version::Alpha, Version::Beta];

impl Version {
    /// Path segment used in REST URLs (`/compute/<segment>/projects/...`).
    pub fn url_segment(self) -> &'static str {
        match self {
            Version::Ga => "v1",
            Version::Alpha => "alpha",
            Version::Beta => "beta",
        }
    }

    /// Inverse of [`Version::url_segment`].
    pub fn from_url_segment(segment: &str) -> Option<Self> {
        match segment {
            "v1" => Some(Version::Ga),
            "alpha" => Some(Version::Alpha),
            "beta" => Some(Version::Beta),
            _ => None,
        }
    }

    /// Short module prefix for tier-qualified type names (`ga`, `alpha`, `beta`).
    pub fn as_str(self) -> &'static str {
        match self {
            Version::Ga => "ga",
            Version::Alpha => "alpha",
            Version::Beta => "beta",
        }
    }

    /// Prefix used when naming wrapper types (`""`, `"Alpha"`, `"Beta"`).
    pub fn type_prefix(self) -> &'static str {
        match self {
            Version::Ga => "",
            Version::Alpha => "Alpha",
            Version::Beta => "Beta",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures found while validating the catalog against the native schemas.
///
/// These are fatal at generation time and never occur while dispatching calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("failed to load {file}: {reason}")]
    Schema { file: String, reason: String },

    #[error("native service {native:?} not found for {version} {service:?}")]
    UnknownNativeService {
        version: Version,
        service: String,
        native: String,
    },

    #[error("method {method:?} was not found in service {service:?}")]
    MissingMethod { service: String, method: String },

    #[error("method {service:?}.{method:?}: arity = {arity} which is less than required ({required})")]
    Arity {
        service: String,
        method: String,
        arity: usize,
        required: usize,
    },

    #[error("method {service:?}.{method:?}: skipped args can only be strings (arg {index} is {found})")]
    NonStringScopeArg {
        service: String,
        method: String,
        index: usize,
        found: String,
    },

    #[error("method {service:?}.{method:?}: generator only supports methods returning a single *xxxCall handle")]
    ReturnShape { service: String, method: String },

    #[error("method {service:?}.{method:?}: handle {handle:?} does not have a {completion}() method")]
    MissingCompletion {
        service: String,
        method: String,
        handle: String,
        completion: String,
    },

    #[error("method {service:?}.{method:?}: {completion}() of {handle:?} returns {found}; want (error) or (*Operation, error)")]
    CompletionResult {
        service: String,
        method: String,
        handle: String,
        completion: String,
        found: String,
    },

    #[error("method {service:?}.{method:?}: cannot dispatch over REST: {reason}")]
    Dispatch {
        service: String,
        method: String,
        reason: String,
    },

    #[error("unhandled package {0:?}")]
    UnknownPackage(String),

    #[error("failed to render generated source")]
    Format(#[from] std::fmt::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_url_segment_round_trip() {
        for v in ALL_VERSIONS {
            assert_eq!(Version::from_url_segment(v.url_segment()), Some(v));
        }
        assert_eq!(Version::from_url_segment("gamma"), None);
    }

    #[test]
    fn test_default_version_is_ga() {
        assert_eq!(Version::default(), Version::Ga);
    }
}
