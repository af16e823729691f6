//! Clocks and timers.
//!
//! Cache freshness reads the time through a [`Clock`] so that tests can drive it
//! by hand with [`ManualClock`]. Timers (`sleep`) use `tokio::time` natively and
//! `gloo-timers` in the browser.

use std::cell::Cell;
use std::time::Duration;

/// Monotonic-enough time source, in milliseconds.
pub trait Clock {
	/// Milliseconds since an arbitrary fixed origin.
	fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
impl Clock for SystemClock {
	fn now_ms(&self) -> u64 {
		js_sys::Date::now() as u64
	}
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
impl Clock for SystemClock {
	fn now_ms(&self) -> u64 {
		std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or(0)
	}
}

/// A clock that only moves when told to.
///
/// ```
/// use pagewire_client::time::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_millis(1500));
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
	now: Cell<u64>,
}

impl ManualClock {
	/// A clock starting at zero.
	pub fn new() -> Self {
		Self::default()
	}

	/// Moves the clock forward.
	pub fn advance(&self, by: Duration) {
		self.now.set(self.now.get() + by.as_millis() as u64);
	}

	/// Sets the clock to an absolute value.
	pub fn set_ms(&self, ms: u64) {
		self.now.set(ms);
	}
}

impl Clock for ManualClock {
	fn now_ms(&self) -> u64 {
		self.now.get()
	}
}

/// Waits for `duration`.
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub async fn sleep(duration: Duration) {
	gloo_timers::future::sleep(duration).await;
}

/// Waits for `duration`.
#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub async fn sleep(duration: Duration) {
	tokio::time::sleep(duration).await;
}
