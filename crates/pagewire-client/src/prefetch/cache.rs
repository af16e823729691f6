use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};

use super::CacheFor;
use crate::error::ClientError;
use crate::http::HttpResponse;
use crate::time::Clock;

/// A response future that any number of requests can await.
pub type SharedResponse = Shared<LocalBoxFuture<'static, Result<HttpResponse, ClientError>>>;

struct PrefetchEntry {
	url: String,
	cache_for: CacheFor,
	created_at: u64,
	response: SharedResponse,
}

/// Result of looking a key up.
pub enum CacheLookup {
	/// Younger than its ttl.
	Fresh(SharedResponse),
	/// Past its ttl but inside its stale window.
	Stale {
		/// The cached response.
		response: SharedResponse,
		/// Lifetime of the entry, reused for the revalidated one.
		cache_for: CacheFor,
	},
	/// Absent, expired, or failed.
	Miss,
}

impl std::fmt::Debug for CacheLookup {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Fresh(_) => f.write_str("Fresh"),
			Self::Stale { .. } => f.write_str("Stale"),
			Self::Miss => f.write_str("Miss"),
		}
	}
}

/// The prefetch cache.
///
/// Owned by the session; clones share entries. Every method is synchronous, so a
/// sweep, lookup and insert performed in one call sequence cannot interleave
/// with another request.
#[derive(Clone)]
pub struct PrefetchCache {
	entries: Rc<RefCell<BTreeMap<String, PrefetchEntry>>>,
	clock: Rc<dyn Clock>,
}

impl PrefetchCache {
	/// An empty cache reading time from `clock`.
	pub fn new(clock: Rc<dyn Clock>) -> Self {
		Self {
			entries: Rc::default(),
			clock,
		}
	}

	/// Classifies the entry under `key`, evicting it if it expired or failed.
	pub fn lookup(&self, key: &str) -> CacheLookup {
		let now = self.clock.now_ms();
		let mut entries = self.entries.borrow_mut();
		let Some(entry) = entries.get(key) else {
			return CacheLookup::Miss;
		};

		let failed = matches!(entry.response.peek(), Some(Err(_)));
		let age = now.saturating_sub(entry.created_at);
		if failed || age >= entry.cache_for.expires_after_ms() {
			tracing::debug!(url = %entry.url, age, failed, "evicting prefetched response");
			entries.remove(key);
			return CacheLookup::Miss;
		}

		if age < entry.cache_for.ttl_ms() {
			tracing::debug!(url = %entry.url, age, "prefetch cache hit");
			CacheLookup::Fresh(entry.response.clone())
		} else {
			tracing::debug!(url = %entry.url, age, "prefetch cache hit (stale)");
			CacheLookup::Stale {
				response: entry.response.clone(),
				cache_for: entry.cache_for,
			}
		}
	}

	/// Stores a response under `key`, replacing any previous entry.
	pub fn insert(&self, key: String, url: impl Into<String>, cache_for: CacheFor, response: SharedResponse) {
		let url = url.into();
		tracing::debug!(url = %url, ttl_ms = cache_for.ttl_ms(), "prefetch cache insert");
		self.entries.borrow_mut().insert(
			key,
			PrefetchEntry {
				url,
				cache_for,
				created_at: self.clock.now_ms(),
				response,
			},
		);
	}

	/// Evicts every expired entry. Returns how many were removed.
	pub fn sweep(&self) -> usize {
		let now = self.clock.now_ms();
		let mut entries = self.entries.borrow_mut();
		let before = entries.len();
		entries.retain(|_, entry| now.saturating_sub(entry.created_at) < entry.cache_for.expires_after_ms());
		let removed = before - entries.len();
		if removed > 0 {
			tracing::debug!(removed, "swept expired prefetch entries");
		}
		removed
	}

	/// Removes the entry under `key`.
	pub fn remove(&self, key: &str) -> bool {
		self.entries.borrow_mut().remove(key).is_some()
	}

	/// Removes every entry for `url`, whatever its method or body.
	pub fn flush(&self, url: &str) -> usize {
		let mut entries = self.entries.borrow_mut();
		let before = entries.len();
		entries.retain(|_, entry| entry.url != url);
		before - entries.len()
	}

	/// Removes everything.
	pub fn flush_all(&self) {
		self.entries.borrow_mut().clear();
	}

	/// Whether a usable entry exists for `url`.
	pub fn is_prefetched(&self, url: &str) -> bool {
		let now = self.clock.now_ms();
		self.entries.borrow().values().any(|entry| {
			entry.url == url && now.saturating_sub(entry.created_at) < entry.cache_for.expires_after_ms()
		})
	}

	/// Number of entries whose response has not arrived yet.
	pub fn in_flight(&self) -> usize {
		self.entries
			.borrow()
			.values()
			.filter(|entry| entry.response.peek().is_none())
			.count()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Whether the cache is empty.
	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}
}
