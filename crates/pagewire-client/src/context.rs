//! The session context.
//!
//! One [`Session`] is created at startup and owns every piece of process-wide
//! mutable state: the remember table, the prefetch cache, the browser handle and
//! the clock. Components receive the session (or a router holding it) instead of
//! reaching for globals, so several independent sessions can coexist in tests.

use std::rc::Rc;

use crate::config::ClientConfig;
use crate::history::HistoryCodec;
use crate::platform::{Browser, MemoryBrowser};
use crate::prefetch::PrefetchCache;
use crate::store::RememberTable;
use crate::time::{Clock, SystemClock};

struct SessionInner {
	config: ClientConfig,
	browser: Rc<dyn Browser>,
	clock: Rc<dyn Clock>,
	remember: RememberTable,
	prefetch: PrefetchCache,
}

/// Shared handle to the session state. Clones are cheap and share everything.
#[derive(Clone)]
pub struct Session {
	inner: Rc<SessionInner>,
}

impl Session {
	/// Creates a session using the wall clock.
	pub fn new(config: ClientConfig, browser: Rc<dyn Browser>) -> Self {
		Self::with_clock(config, browser, Rc::new(SystemClock))
	}

	/// Creates a session with an explicit clock.
	pub fn with_clock(config: ClientConfig, browser: Rc<dyn Browser>, clock: Rc<dyn Clock>) -> Self {
		let prefetch = PrefetchCache::new(clock.clone());
		Self {
			inner: Rc::new(SessionInner {
				config,
				browser,
				clock,
				remember: RememberTable::new(),
				prefetch,
			}),
		}
	}

	/// A default-configured session over a fresh [`MemoryBrowser`] at `url`.
	pub fn in_memory(url: &str) -> Self {
		Self::new(ClientConfig::default(), Rc::new(MemoryBrowser::new(url)))
	}

	/// Configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Browser handle.
	pub fn browser(&self) -> Rc<dyn Browser> {
		self.inner.browser.clone()
	}

	/// Clock used for cache freshness.
	pub fn clock(&self) -> Rc<dyn Clock> {
		self.inner.clock.clone()
	}

	/// Remembered state.
	pub fn remember(&self) -> RememberTable {
		self.inner.remember.clone()
	}

	/// Prefetch cache.
	pub fn prefetch(&self) -> PrefetchCache {
		self.inner.prefetch.clone()
	}

	/// History codec bound to this session's browser and remember table.
	pub fn history(&self) -> HistoryCodec {
		HistoryCodec::new(
			self.inner.browser.clone(),
			self.inner.remember.clone(),
			self.inner.config.history.clone(),
		)
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("remembered_keys", &self.inner.remember.len())
			.field("prefetch_entries", &self.inner.prefetch.len())
			.finish()
	}
}
