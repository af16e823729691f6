use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use pagewire_core::spawn::spawn_local;

use crate::prefetch::CacheFor;
use crate::router::{Router, VisitOptions};
use crate::time::sleep;

/// Prefetches a link once the pointer rests on it.
///
/// [`handle_enter`](Self::handle_enter) starts a `prefetch.hover_delay_ms`
/// timer; [`handle_leave`](Self::handle_leave) cancels it if it has not fired.
pub struct HoverPrefetch {
	router: Router,
	url: String,
	options: VisitOptions,
	cache_for: Option<CacheFor>,
	delay: Duration,
	timer: Rc<RefCell<Option<AbortHandle>>>,
}

impl HoverPrefetch {
	pub(crate) fn new(router: Router, url: &str, options: VisitOptions, cache_for: Option<CacheFor>) -> Self {
		let delay = Duration::from_millis(router.session().config().prefetch.hover_delay_ms);
		Self {
			router,
			url: url.to_string(),
			options,
			cache_for,
			delay,
			timer: Rc::default(),
		}
	}

	/// Whether a prefetch is scheduled and has not fired yet.
	pub fn is_pending(&self) -> bool {
		self.timer.borrow().is_some()
	}

	/// Pointer entered the link.
	pub fn handle_enter(&self) {
		if self.is_pending() {
			return;
		}
		let (handle, registration) = AbortHandle::new_pair();
		*self.timer.borrow_mut() = Some(handle);

		let router = self.router.clone();
		let url = self.url.clone();
		let options = self.options.clone();
		let cache_for = self.cache_for;
		let delay = self.delay;
		let timer = self.timer.clone();
		spawn_local(async move {
			if Abortable::new(sleep(delay), registration).await.is_err() {
				return;
			}
			timer.borrow_mut().take();
			if let Err(error) = router.prefetch(&url, options, cache_for).await {
				tracing::debug!(%error, url = %url, "hover prefetch failed");
			}
		});
	}

	/// Pointer left the link.
	pub fn handle_leave(&self) {
		if let Some(timer) = self.timer.borrow_mut().take() {
			timer.abort();
		}
	}
}

impl Drop for HoverPrefetch {
	fn drop(&mut self) {
		self.handle_leave();
	}
}

impl std::fmt::Debug for HoverPrefetch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HoverPrefetch")
			.field("url", &self.url)
			.field("delay", &self.delay)
			.field("pending", &self.is_pending())
			.finish()
	}
}
