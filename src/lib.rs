//! # irdata
//!
//! Client layer for the iRacing data API: OAuth token lifecycle with background
//! renewal, cached and retrying GET requests that follow pre-signed blob links,
//! and a bounded worker pool for fetching many resources at once.
//!
//! Modules:
//! - `auth`: credentials, token exchange, persistence and renewal
//! - `cache`: response cache (no-op and redb backed)
//! - `client`: data API client
//! - `worker`: batch executor
//! - `config`: YAML configuration
//! - `app`: wiring used by the `irdata` binary

pub mod app;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod helpers;
pub mod resilience;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod tests;

pub use crate::auth::{TokenManager, TokenProvider};
pub use crate::cache::Cache;
pub use crate::client::ApiClient;
pub use crate::error::{ErrorCategory, IrDataError, Result};
pub use crate::worker::WorkerPool;
