//! gcecloud - one access layer over the three tiers of the GCE compute API
//!
//! - [`meta`] - addressing keys, the service catalog and method validation
//! - [`gen`] - source generation for the wrapper surface and its mocks
//! - [`cloud`] - runtime wrappers, resource identities, operation polling,
//!   rate limiting and in-memory test doubles
//! - [`gcp`] - REST transport and credentials

pub mod cloud;
pub mod config;
pub mod error;
pub mod gcp;
pub mod gen;
pub mod meta;

pub use error::{Error, Result};

/// Cancellation-bearing context accepted by every operation.
pub type Context = tokio_util::sync::CancellationToken;
