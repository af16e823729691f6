use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use pagewire_core::spawn::spawn_local;

use crate::router::{Router, VisitOptions};
use crate::time::sleep;

/// Shortest interval a poll ticks at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct PollState {
	router: Router,
	interval: Duration,
	options: VisitOptions,
	keep_alive: bool,
	throttle: u32,
	timer: RefCell<Option<AbortHandle>>,
	in_flight: RefCell<Option<AbortHandle>>,
	hidden_ticks: Cell<u32>,
	was_hidden: Cell<Option<bool>>,
}

/// Reloads the current page at a fixed interval.
///
/// While the document is hidden (and `keep_alive` is off) only every
/// `poll.hidden_throttle`-th tick fires; the count restarts whenever the
/// visibility changes. A tick aborts the previous reload if it is still
/// running. Dropping the poll stops it.
pub struct Poll {
	state: Rc<PollState>,
}

impl Poll {
	pub(crate) fn new(router: Router, interval: Duration, options: VisitOptions, keep_alive: bool) -> Self {
		let throttle = router.session().config().poll.hidden_throttle.max(1);
		if interval < MIN_POLL_INTERVAL {
			tracing::warn!(
				interval_ms = interval.as_millis() as u64,
				min_ms = MIN_POLL_INTERVAL.as_millis() as u64,
				"poll interval too short; clamping"
			);
		}
		let interval = interval.max(MIN_POLL_INTERVAL);
		Self {
			state: Rc::new(PollState {
				router,
				interval,
				options,
				keep_alive,
				throttle,
				timer: RefCell::new(None),
				in_flight: RefCell::new(None),
				hidden_ticks: Cell::new(0),
				was_hidden: Cell::new(None),
			}),
		}
	}

	/// Starts ticking. Does nothing if already running.
	pub fn start(&self) {
		if self.is_running() {
			return;
		}
		let (handle, registration) = AbortHandle::new_pair();
		*self.state.timer.borrow_mut() = Some(handle);
		self.state.hidden_ticks.set(0);
		self.state.was_hidden.set(None);

		let state = Rc::downgrade(&self.state);
		let interval = self.state.interval;
		tracing::debug!(interval_ms = interval.as_millis() as u64, "poll started");
		spawn_local(async move {
			let ticks = async {
				loop {
					sleep(interval).await;
					if !PollState::tick(&state) {
						break;
					}
				}
			};
			let _ = Abortable::new(ticks, registration).await;
		});
	}

	/// Time between ticks.
	pub fn interval(&self) -> Duration {
		self.state.interval
	}

	/// Stops ticking and aborts a running reload.
	pub fn stop(&self) {
		self.state.stop();
	}

	/// Whether the poll is ticking.
	pub fn is_running(&self) -> bool {
		self.state.timer.borrow().is_some()
	}
}

impl PollState {
	/// Runs one tick. Returns `false` once the poll is gone.
	fn tick(state: &Weak<PollState>) -> bool {
		let Some(state) = state.upgrade() else {
			return false;
		};

		let hidden = state.router.session().browser().is_hidden();
		if state.was_hidden.get() != Some(hidden) {
			state.was_hidden.set(Some(hidden));
			state.hidden_ticks.set(0);
		}
		if hidden && !state.keep_alive {
			let ticks = state.hidden_ticks.get() + 1;
			state.hidden_ticks.set(ticks % state.throttle);
			if ticks % state.throttle != 0 {
				tracing::trace!(ticks, "poll tick skipped while hidden");
				return true;
			}
		}

		let (handle, registration) = AbortHandle::new_pair();
		if let Some(previous) = state.in_flight.borrow_mut().replace(handle) {
			previous.abort();
		}
		let router = state.router.clone();
		let options = state.options.clone();
		spawn_local(async move {
			match Abortable::new(router.reload(options), registration).await {
				Ok(Err(error)) => tracing::warn!(%error, "poll request failed"),
				Err(_) => tracing::debug!("poll request aborted by the next tick"),
				Ok(Ok(_)) => {}
			}
		});
		true
	}

	fn stop(&self) {
		if let Some(timer) = self.timer.borrow_mut().take() {
			timer.abort();
			tracing::debug!("poll stopped");
		}
		if let Some(request) = self.in_flight.borrow_mut().take() {
			request.abort();
		}
	}
}

impl Drop for Poll {
	fn drop(&mut self) {
		self.state.stop();
	}
}

impl std::fmt::Debug for Poll {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Poll")
			.field("interval", &self.state.interval)
			.field("keep_alive", &self.state.keep_alive)
			.field("running", &self.is_running())
			.finish()
	}
}
