//! Response cache keyed by the request path and query.
//!
//! Entries carry no expiry metadata: once stored, a value is returned for its key
//! until the caller deletes it.

pub mod noop;
pub mod redb_cache;

use crate::error::Result;

pub use noop::NoopCache;
pub use redb_cache::RedbCache;

pub trait Cache: Send + Sync {
    /// Read failures are reported as a miss.
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}
