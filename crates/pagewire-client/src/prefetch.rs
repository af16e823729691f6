//! Prefetch cache.
//!
//! Responses fetched ahead of time are kept as shared futures keyed by a hash
//! of method, URL and body. The cache is consulted by the client *before* it
//! calls the transport:
//!
//! | age                         | prefetch request      | normal request                       |
//! |-----------------------------|-----------------------|--------------------------------------|
//! | `< ttl`                     | reuse pending future  | serve cached response                |
//! | `ttl ..= ttl + stale`       | refetch, replace      | serve cached, revalidate in background |
//! | older / absent              | fetch, insert         | evict, fetch from network            |

mod cache;
mod duration;
mod key;

pub use cache::{CacheLookup, PrefetchCache, SharedResponse};
pub use duration::{CacheFor, parse_duration};
pub use key::cache_key;

/// Errors raised by prefetch configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefetchError {
	/// A cache duration literal could not be parsed.
	#[error("invalid cache duration {0:?}; expected e.g. \"30s\", \"5m\", \"1h\", \"1d\" or \"1w\"")]
	InvalidDuration(String),
	/// The request body could not be serialized for hashing.
	#[error("cannot compute prefetch cache key: {0}")]
	Key(String),
}
