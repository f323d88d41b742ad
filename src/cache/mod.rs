//! Caching layer for the per-user GitHub datasets.
//!
//! This module provides:
//! - One cache entry per owner and resource type, holding the complete
//!   collection (no query parameters in the key)
//! - Single-flight population of missing or expired entries
//! - Stale-on-error: an expired copy is served when the refresh fails
//! - Interchangeable backends (in-process map, SQLite, disabled)

mod key;
mod manager;
mod observer;
mod sqlite;
mod store;
mod traits;

pub use key::CacheKey;
pub use manager::DatasetCache;
pub use observer::CacheStats;
pub use sqlite::SqliteStore;
pub use store::{CacheStore, MemoryStore, NoopStore};
pub use traits::{CacheResult, CacheSource, CachedCollection, Expiring};
