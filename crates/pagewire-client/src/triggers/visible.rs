use std::cell::Cell;
use std::rc::Rc;

use pagewire_core::spawn::spawn_local;

use crate::router::{Router, VisitOptions};

/// Reloads props when an element scrolls into view.
///
/// Feed it intersection changes with [`handle_intersection`](Self::handle_intersection).
/// While a load is running further intersections are ignored. After the
/// first successful load the loader disconnects unless [`always`](Self::always)
/// is set.
pub struct WhenVisible {
	router: Router,
	options: VisitOptions,
	buffer: u32,
	always: bool,
	fetching: Rc<Cell<bool>>,
	connected: Rc<Cell<bool>>,
}

impl WhenVisible {
	pub(crate) fn new(router: Router, options: VisitOptions) -> Self {
		Self {
			router,
			options: options.preserve_history(true),
			buffer: 0,
			always: false,
			fetching: Rc::new(Cell::new(false)),
			connected: Rc::new(Cell::new(true)),
		}
	}

	/// Starts loading this many pixels before the element is visible.
	pub fn buffer(mut self, pixels: u32) -> Self {
		self.buffer = pixels;
		self
	}

	/// Loads on every intersection instead of only the first.
	pub fn always(mut self, always: bool) -> Self {
		self.always = always;
		self
	}

	/// Extra options for the reload.
	pub fn options(mut self, f: impl FnOnce(VisitOptions) -> VisitOptions) -> Self {
		self.options = f(self.options);
		self
	}

	/// `rootMargin` for the host's intersection observer.
	pub fn root_margin(&self) -> String {
		format!("{}px", self.buffer)
	}

	/// Whether a load is running.
	pub fn is_fetching(&self) -> bool {
		self.fetching.get()
	}

	/// Whether the loader still reacts to intersections.
	pub fn is_connected(&self) -> bool {
		self.connected.get()
	}

	/// Handles an intersection change. Returns whether a load was started.
	pub fn handle_intersection(&self, visible: bool) -> bool {
		if !visible || !self.connected.get() || self.fetching.get() {
			return false;
		}
		self.fetching.set(true);

		let router = self.router.clone();
		let options = self.options.clone();
		let fetching = self.fetching.clone();
		let connected = self.connected.clone();
		let always = self.always;
		spawn_local(async move {
			let result = router.reload(options).await;
			fetching.set(false);
			match result {
				Ok(_) if !always => connected.set(false),
				Ok(_) => {}
				Err(error) => tracing::warn!(%error, "visibility-triggered load failed"),
			}
		});
		true
	}
}

impl std::fmt::Debug for WhenVisible {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WhenVisible")
			.field("buffer", &self.buffer)
			.field("always", &self.always)
			.field("fetching", &self.fetching.get())
			.field("connected", &self.connected.get())
			.finish()
	}
}
