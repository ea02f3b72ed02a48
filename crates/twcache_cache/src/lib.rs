//! Cache keys, entries and stores for the caching forwarder.
//!
//! A [`CacheEntry`] is written once per successful forward and fully
//! replaced by later writes under the same [`CacheKey`]. Expiry is logical:
//! stale rows stay in the store and are simply never returned by
//! [`CacheStore::lookup`].

pub mod entry;
pub mod error;
pub mod key;
pub mod policy;
pub mod sqlite;
pub mod store;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use key::CacheKey;
pub use policy::{CACHEABLE_HEADERS, CachePolicy, CachedHeaders};
pub use sqlite::{SqliteCacheStore, SqliteOptions};
pub use store::{CacheStore, MemoryCacheStore};
