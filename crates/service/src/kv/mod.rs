//! Key-value capability consumed by the mirror.
//!
//! The trait is the only thing the mirror knows about persistence. Backends:
//! - [`MemoryKv`]: in-process, Redis-compatible semantics, used by tests and dry runs.
//! - [`RedisKv`]: RESP2 over TCP with lazy connect and bounded retries.

use async_trait::async_trait;

use crate::errors::ServiceError;

pub mod memory;
pub mod redis;
pub mod resp;

pub use memory::MemoryKv;
pub use redis::RedisKv;

/// Store capability. Implementations can be in-memory or remote.
///
/// Range indices follow `LRANGE`: both ends inclusive, negative values count from the tail.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store a string with no expiry, replacing any previous value.
    async fn set_string(&self, key: &str, value: &str) -> Result<(), ServiceError>;
    /// `Ok(None)` when the key does not exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>, ServiceError>;
    /// Push `items` to the tail of the list at `key`, creating it when missing.
    async fn append_list(&self, key: &str, items: &[String]) -> Result<(), ServiceError>;
    /// `Ok(None)` when the range selects nothing: the key is missing (an empty list does
    /// not exist) or the indices fall outside the list. `Some` is never empty.
    async fn get_list_range(&self, key: &str, start: i64, end: i64) -> Result<Option<Vec<String>>, ServiceError>;
    /// Drop every key in the store's keyspace.
    async fn flush_all(&self) -> Result<(), ServiceError>;
}
