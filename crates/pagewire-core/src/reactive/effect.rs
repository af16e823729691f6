//! Effect - Reactive Side Effects
//!
//! `Effect` represents a computation that automatically re-runs when its dependencies change.
//! Dependencies are tracked automatically - any Signal read inside the effect closure
//! becomes a dependency, and the set is rebuilt from scratch on every run.
//!
//! ## Key Features
//!
//! - **Synchronous Re-execution**: a dependent Signal's `set` re-runs the effect before returning
//! - **Cleanup Support**: an effect may return a [`Cleanup`], run right before the next
//!   re-run and on disposal. Cleanups may also resolve asynchronously.
//! - **Failure Isolation**: errors and panics inside an effect are logged, never propagated,
//!   so one failing subscriber cannot break a propagation pass
//! - **Idempotent Disposal**: `dispose()` may be called any number of times
//!
//! ## Example
//!
//! ```
//! use pagewire_core::reactive::{Cleanup, Effect, Signal};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let count = Signal::new(0);
//! let cleanups = Rc::new(Cell::new(0));
//!
//! let effect = Effect::with_cleanup({
//!     let count = count.clone();
//!     let cleanups = cleanups.clone();
//!     move || {
//!         let _ = count.get();
//!         let cleanups = cleanups.clone();
//!         Some(Cleanup::new(move || cleanups.set(cleanups.get() + 1)))
//!     }
//! });
//!
//! count.set(1);
//! assert_eq!(cleanups.get(), 1);
//!
//! effect.dispose();
//! effect.dispose();
//! assert_eq!(cleanups.get(), 2);
//! ```

use core::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::runtime::{NodeId, ObserverGuard, try_with_runtime, untrack, with_runtime};
use crate::spawn::spawn_local;

/// Error reported by a fallible effect.
///
/// Effect errors are logged by the runtime; they never reach the code that
/// wrote the signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
	/// The computation failed with a message.
	#[error("effect failed: {0}")]
	Failed(String),
}

impl EffectError {
	/// Creates a failure with the given message.
	pub fn new(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}

impl From<String> for EffectError {
	fn from(message: String) -> Self {
		Self::Failed(message)
	}
}

impl From<&str> for EffectError {
	fn from(message: &str) -> Self {
		Self::Failed(message.to_string())
	}
}

type CleanupFn = Box<dyn FnOnce() + 'static>;

/// Cleanup returned by an effect run.
///
/// Runs immediately before the effect's next run and when the effect is disposed.
pub struct Cleanup(CleanupKind);

enum CleanupKind {
	Now(CleanupFn),
	Deferred(LocalBoxFuture<'static, Option<CleanupFn>>),
}

impl Cleanup {
	/// A cleanup that is available as soon as the effect returns.
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce() + 'static,
	{
		Self(CleanupKind::Now(Box::new(f)))
	}

	/// A cleanup that becomes available when `future` resolves.
	///
	/// If the effect re-runs or is disposed before that, the cleanup runs as soon
	/// as the future resolves, outside of any observer.
	pub fn deferred<Fut, F>(future: Fut) -> Self
	where
		Fut: Future<Output = Option<F>> + 'static,
		F: FnOnce() + 'static,
	{
		Self(CleanupKind::Deferred(
			future
				.map(|cleanup| cleanup.map(|f| Box::new(f) as CleanupFn))
				.boxed_local(),
		))
	}
}

impl core::fmt::Debug for Cleanup {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self.0 {
			CleanupKind::Now(_) => f.write_str("Cleanup::Now"),
			CleanupKind::Deferred(_) => f.write_str("Cleanup::Deferred"),
		}
	}
}

enum SlotState {
	Empty,
	Ready(CleanupFn),
	Pending { abandoned: bool },
}

type CleanupSlot = Rc<RefCell<SlotState>>;

type EffectFn = Box<dyn FnMut() -> Result<Option<Cleanup>, EffectError> + 'static>;

struct EffectNode {
	func: RefCell<EffectFn>,
	cleanup: RefCell<CleanupSlot>,
	disposed: Cell<bool>,
}

impl EffectNode {
	/// Runs (or abandons, if still pending) the cleanup from the previous run.
	fn release_cleanup(&self) {
		let slot = self
			.cleanup
			.replace(Rc::new(RefCell::new(SlotState::Empty)));
		let previous = core::mem::replace(&mut *slot.borrow_mut(), SlotState::Empty);
		match previous {
			SlotState::Ready(f) => untrack(f),
			SlotState::Pending { .. } => {
				*slot.borrow_mut() = SlotState::Pending { abandoned: true };
			}
			SlotState::Empty => {}
		}
	}

	fn store_cleanup(&self, cleanup: Cleanup) {
		match cleanup.0 {
			CleanupKind::Now(f) => {
				*self.cleanup.borrow().borrow_mut() = SlotState::Ready(f);
			}
			CleanupKind::Deferred(future) => {
				let slot = self.cleanup.borrow().clone();
				*slot.borrow_mut() = SlotState::Pending { abandoned: false };
				spawn_local(async move {
					let resolved = future.await;
					let state = core::mem::replace(&mut *slot.borrow_mut(), SlotState::Empty);
					match (state, resolved) {
						(SlotState::Pending { abandoned: true }, Some(f)) => untrack(f),
						(SlotState::Pending { abandoned: false }, Some(f)) => {
							*slot.borrow_mut() = SlotState::Ready(f);
						}
						_ => {}
					}
				});
			}
		}
	}
}

// Storage for Effect nodes, so the runtime can re-execute them by id.
thread_local! {
	static EFFECTS: RefCell<BTreeMap<NodeId, Rc<EffectNode>>> = RefCell::new(BTreeMap::new());
}

/// A reactive effect that automatically re-runs when its dependencies change
///
/// Effects run once when created and again, synchronously, whenever a Signal read
/// during their previous run changes. Dropping the handle disposes the effect.
pub struct Effect {
	/// Unique identifier for this effect
	id: NodeId,
	node: Rc<EffectNode>,
}

impl Effect {
	/// Create a new Effect that runs the given function
	///
	/// # Example
	///
	/// ```
	/// use pagewire_core::reactive::{Effect, Signal};
	///
	/// let count = Signal::new(0);
	/// let _effect = Effect::new({
	///     let count = count.clone();
	///     move || {
	///         let _ = count.get();
	///     }
	/// });
	/// ```
	pub fn new<F>(mut f: F) -> Self
	where
		F: FnMut() + 'static,
	{
		Self::from_fn(Box::new(move || {
			f();
			Ok(None)
		}))
	}

	/// Create an Effect whose runs may return a cleanup.
	pub fn with_cleanup<F>(mut f: F) -> Self
	where
		F: FnMut() -> Option<Cleanup> + 'static,
	{
		Self::from_fn(Box::new(move || Ok(f())))
	}

	/// Create a fallible Effect. A returned error is logged and the graph keeps going.
	pub fn try_new<F>(f: F) -> Self
	where
		F: FnMut() -> Result<Option<Cleanup>, EffectError> + 'static,
	{
		Self::from_fn(Box::new(f))
	}

	fn from_fn(func: EffectFn) -> Self {
		let id = NodeId::new();
		let node = Rc::new(EffectNode {
			func: RefCell::new(func),
			cleanup: RefCell::new(Rc::new(RefCell::new(SlotState::Empty))),
			disposed: Cell::new(false),
		});

		EFFECTS.with(|storage| {
			storage.borrow_mut().insert(id, node.clone());
		});

		Self::execute_effect(id);

		Self { id, node }
	}

	/// Execute an effect by its ID
	///
	/// Called by signals when a dependency changes. Re-entrant runs of an effect
	/// that is already executing are refused.
	pub(crate) fn execute_effect(effect_id: NodeId) {
		let Some(node) = EFFECTS.with(|storage| storage.borrow().get(&effect_id).cloned()) else {
			return;
		};
		if node.disposed.get() {
			return;
		}
		if !with_runtime(|rt| rt.begin_run(effect_id)) {
			tracing::warn!(effect = %effect_id, "effect wrote to its own dependency; skipping re-entrant run");
			return;
		}

		node.release_cleanup();
		with_runtime(|rt| rt.clear_dependencies(effect_id));

		let outcome = {
			let _guard = ObserverGuard::push(Some(effect_id));
			let mut func = node.func.borrow_mut();
			catch_unwind(AssertUnwindSafe(|| (*func)()))
		};

		with_runtime(|rt| rt.end_run(effect_id));

		match outcome {
			Ok(Ok(Some(cleanup))) => {
				node.store_cleanup(cleanup);
				if node.disposed.get() {
					node.release_cleanup();
				}
			}
			Ok(Ok(None)) => {}
			Ok(Err(error)) => {
				tracing::error!(effect = %effect_id, %error, "effect failed");
			}
			Err(panic) => {
				let message = panic
					.downcast_ref::<&str>()
					.map(|s| s.to_string())
					.or_else(|| panic.downcast_ref::<String>().cloned())
					.unwrap_or_else(|| "non-string panic payload".to_string());
				tracing::error!(effect = %effect_id, panic = %message, "effect panicked");
			}
		}
	}

	/// Get the NodeId of this effect
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Whether this effect has been disposed
	pub fn is_disposed(&self) -> bool {
		self.node.disposed.get()
	}

	/// Dispose this effect
	///
	/// The effect stops running and its pending cleanup runs once. Calling this
	/// again is a no-op.
	pub fn dispose(&self) {
		if self.node.disposed.replace(true) {
			return;
		}

		// Ignore if TLS is already destroyed
		let _ = try_with_runtime(|rt| rt.remove_node(self.id));
		let _ = EFFECTS.try_with(|storage| {
			storage.borrow_mut().remove(&self.id);
		});

		self.node.release_cleanup();
	}
}

impl Drop for Effect {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl core::fmt::Debug for Effect {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Effect")
			.field("id", &self.id)
			.field("disposed", &self.is_disposed())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reactive::Signal;
	use serial_test::serial;

	#[test]
	#[serial]
	fn test_effect_runs_immediately() {
		let run_count = Rc::new(Cell::new(0));
		let _effect = Effect::new({
			let run_count = run_count.clone();
			move || run_count.set(run_count.get() + 1)
		});

		assert_eq!(run_count.get(), 1);
	}

	#[test]
	#[serial]
	fn test_effect_reruns_synchronously() {
		let signal = Signal::new(0);
		let values = Rc::new(RefCell::new(Vec::new()));

		let _effect = Effect::new({
			let signal = signal.clone();
			let values = values.clone();
			move || values.borrow_mut().push(signal.get())
		});

		signal.set(10);
		signal.set(20);
		assert_eq!(*values.borrow(), vec![0, 10, 20]);
	}

	#[test]
	#[serial]
	fn test_effect_dispose_is_idempotent() {
		let signal = Signal::new(0);
		let cleanups = Rc::new(Cell::new(0));

		let effect = Effect::with_cleanup({
			let signal = signal.clone();
			let cleanups = cleanups.clone();
			move || {
				let _ = signal.get();
				let cleanups = cleanups.clone();
				Some(Cleanup::new(move || cleanups.set(cleanups.get() + 1)))
			}
		});

		effect.dispose();
		effect.dispose();
		drop(effect);

		assert_eq!(cleanups.get(), 1);
		signal.set(5);
		assert_eq!(cleanups.get(), 1);
	}

	#[test]
	#[serial]
	fn test_cleanup_runs_before_rerun() {
		let signal = Signal::new(0);
		let log = Rc::new(RefCell::new(Vec::new()));

		let _effect = Effect::with_cleanup({
			let signal = signal.clone();
			let log = log.clone();
			move || {
				let value = signal.get();
				log.borrow_mut().push(format!("run {value}"));
				let log = log.clone();
				Some(Cleanup::new(move || log.borrow_mut().push(format!("cleanup {value}"))))
			}
		});

		signal.set(1);
		assert_eq!(*log.borrow(), vec!["run 0", "cleanup 0", "run 1"]);
	}

	#[test]
	#[serial]
	fn test_failing_effect_does_not_stop_others() {
		let signal = Signal::new(0);
		let seen = Rc::new(Cell::new(0));

		let _failing = Effect::try_new({
			let signal = signal.clone();
			move || {
				if signal.get() > 0 {
					return Err(EffectError::new("boom"));
				}
				Ok(None)
			}
		});
		let _panicking = Effect::new({
			let signal = signal.clone();
			move || {
				if signal.get() > 0 {
					panic!("subscriber exploded");
				}
			}
		});
		let _healthy = Effect::new({
			let signal = signal.clone();
			let seen = seen.clone();
			move || seen.set(signal.get())
		});

		signal.set(3);
		assert_eq!(seen.get(), 3);
	}

	#[test]
	#[serial]
	fn test_self_write_does_not_recurse() {
		let signal = Signal::new(0);
		let runs = Rc::new(Cell::new(0));

		let _effect = Effect::new({
			let signal = signal.clone();
			let runs = runs.clone();
			move || {
				runs.set(runs.get() + 1);
				let value = signal.get();
				if value < 5 {
					signal.set(value + 1);
				}
			}
		});

		assert_eq!(runs.get(), 1);
		assert_eq!(signal.get_untracked(), 1);
	}
}
