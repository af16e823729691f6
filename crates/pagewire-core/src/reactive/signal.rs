//! Signals.
//!
//! A [`Signal`] is a shared cell whose reads are recorded by the effect that
//! performs them and whose writes re-run those effects.
//!
//! ## Key Features
//!
//! - **Automatic Dependency Tracking**: `get()` inside an Effect registers the Effect as a dependent.
//! - **Synchronous Notification**: `set()` re-runs every current dependent before returning.
//! - **Equality Suppression**: writes judged equal to the current value (by the signal's
//!   equality predicate, `PartialEq` by default) do not notify anyone. `force_set` bypasses it.
//! - **Lightweight**: `Signal<T>` is an id plus a shared `Rc`, cheap to clone and pass around.
//!
//! ## Example
//!
//! ```
//! use pagewire_core::reactive::Signal;
//!
//! let count = Signal::new(0);
//! assert_eq!(count.get(), 0);
//!
//! count.set(42);
//! assert_eq!(count.get(), 42);
//!
//! count.update(|n| *n += 1);
//! assert_eq!(count.get(), 43);
//! ```

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use super::effect::Effect;
use super::runtime::{NodeId, try_with_runtime, with_runtime};

type EqualsFn<T> = Box<dyn Fn(&T, &T) -> bool>;

struct SignalInner<T> {
	value: RefCell<T>,
	equals: EqualsFn<T>,
}

/// Shared reactive cell. Clones point at the same value.
///
/// All clones of the same Signal share the same underlying value.
pub struct Signal<T: 'static> {
	/// Graph identity
	id: NodeId,
	inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			inner: self.inner.clone(),
		}
	}
}

impl<T: PartialEq + 'static> Signal<T> {
	/// Create a new Signal that suppresses writes equal (`==`) to the current value
	pub fn new(value: T) -> Self {
		Self::with_equality(value, |a, b| a == b)
	}
}

impl<T: 'static> Signal<T> {
	/// Create a Signal with a custom equality predicate
	///
	/// ```
	/// use pagewire_core::reactive::Signal;
	///
	/// // Compare case-insensitively
	/// let name = Signal::with_equality("Ada".to_string(), |a: &String, b: &String| {
	///     a.eq_ignore_ascii_case(b)
	/// });
	/// name.set("ADA".to_string());
	/// assert_eq!(name.get_untracked(), "Ada");
	/// ```
	pub fn with_equality<F>(value: T, equals: F) -> Self
	where
		F: Fn(&T, &T) -> bool + 'static,
	{
		Self {
			id: NodeId::new(),
			inner: Rc::new(SignalInner {
				value: RefCell::new(value),
				equals: Box::new(equals),
			}),
		}
	}

	/// Create a Signal that notifies on every write
	pub fn always_notify(value: T) -> Self {
		Self::with_equality(value, |_, _| false)
	}

	/// Get the current value, registering the running Effect (if any) as a dependent
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.track();
		self.get_untracked()
	}

	/// Reads the value without subscribing the current effect.
	pub fn get_untracked(&self) -> T
	where
		T: Clone,
	{
		self.inner.value.borrow().clone()
	}

	/// Borrow the current value (tracked)
	///
	/// The closure must not write to this signal.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		self.track();
		f(&self.inner.value.borrow())
	}

	/// Borrow the current value without tracking dependencies
	pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.inner.value.borrow())
	}

	fn track(&self) {
		with_runtime(|rt| rt.track_dependency(self.id));
	}

	/// Replaces the value
	///
	/// Returns `true` if the value was judged different and dependents were notified.
	pub fn set(&self, value: T) -> bool {
		let unchanged = {
			let current = self.inner.value.borrow();
			(self.inner.equals)(&current, &value)
		};
		if unchanged {
			return false;
		}
		self.force_set(value);
		true
	}

	/// Set the signal and notify dependents even if the value is unchanged
	pub fn force_set(&self, value: T) {
		*self.inner.value.borrow_mut() = value;
		self.notify();
	}

	/// Update the signal's value in place
	///
	/// The mutation is applied to a copy and then written with [`Signal::set`], so
	/// an update that leaves the value equal does not notify.
	///
	/// ```
	/// use pagewire_core::reactive::Signal;
	///
	/// let items = Signal::new(vec![1, 2]);
	/// items.update(|v| v.push(3));
	/// assert_eq!(items.get(), vec![1, 2, 3]);
	/// ```
	pub fn update<F>(&self, f: F) -> bool
	where
		F: FnOnce(&mut T),
		T: Clone,
	{
		let mut next = self.get_untracked();
		f(&mut next);
		self.set(next)
	}

	/// Compute the next value from the current one
	pub fn update_with<F>(&self, f: F) -> bool
	where
		F: FnOnce(&T) -> T,
	{
		let next = f(&self.inner.value.borrow());
		self.set(next)
	}

	/// Re-run every current dependent
	pub fn notify(&self) {
		let subscribers = with_runtime(|rt| rt.subscribers(self.id));
		for effect_id in subscribers {
			Effect::execute_effect(effect_id);
		}
	}

	/// Run `callback` with the current value now and after every change
	///
	/// The returned Effect is the subscription; drop or `dispose()` it to unsubscribe.
	pub fn subscribe<F>(&self, mut callback: F) -> Effect
	where
		F: FnMut(&T) + 'static,
		T: Clone,
	{
		let signal = self.clone();
		Effect::new(move || {
			let value = signal.get();
			super::runtime::untrack(|| callback(&value));
		})
	}

	/// Graph identity of this signal.
	pub fn id(&self) -> NodeId {
		self.id
	}
}

impl<T: 'static> Drop for Signal<T> {
	fn drop(&mut self) {
		// last clone leaves the graph
		if Rc::strong_count(&self.inner) == 1 {
			let _ = try_with_runtime(|rt| rt.remove_node(self.id));
		}
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("id", &self.id)
			.field("value", &*self.inner.value.borrow())
			.finish()
	}
}
