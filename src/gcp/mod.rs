//! Native compute transport
//!
//! This module provides the per-tier REST clients the cloud wrappers
//! dispatch to, including authentication and HTTP handling.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Per-tier compute client (URL layout, operations endpoints)
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use gcecloud::gcp::{auth::GcpCredentials, client::ComputeClient, http::GcpHttpClient};
//!
//! async fn example() -> gcecloud::Result<()> {
//!     let tokens = std::sync::Arc::new(GcpCredentials::new().await?);
//!     let http = GcpHttpClient::new("gcecloud")?;
//!     let ga = ComputeClient::new(Version::Ga, DEFAULT_ENDPOINT, http, tokens);
//!     let zones = ga.get(&ga.compute_url("my-project", "zones")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
