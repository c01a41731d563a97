//! Domain-reconnaissance record schema and its flat key namespace.
//!
//! - `record` holds the in-memory tree mirrored by the service layer.
//! - `field` maps every leaf of that tree to exactly one store key.

pub mod field;
pub mod record;

pub use field::{decode_flag, encode_flag, Field, StorageKind};
pub use record::{Domain, Record, Web, Whois};
