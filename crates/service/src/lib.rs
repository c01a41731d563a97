//! Service layer mirroring a reconnaissance [`models::Record`] onto a key-value store.
//! - `kv` defines the store capability and its backends.
//! - `mirror` keeps the in-memory record and the flat keyspace in sync.
//! - `retry` bounds how hard a backend tries before giving up.

pub mod errors;
pub mod kv;
pub mod mirror;
pub mod retry;

pub use errors::ServiceError;
pub use kv::{KvStore, MemoryKv, RedisKv};
pub use mirror::{MirrorStore, SharedRecord};
