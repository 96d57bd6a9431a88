// Cache module for local filesystem caching.
// Stores fetched repository partitions and refresh metadata between runs.

pub mod paths;
pub mod store;

pub use paths::{PartitionKey, PartitionSource, default_cache_dir};
pub use store::{CacheMetadata, CacheStore, DEFAULT_STALE_AFTER, is_stale};
