use pagewire_core::reactive::{Effect, Signal};
use pagewire_core::value::pages_equal;
use pagewire_core::Page;

/// The current page.
///
/// A thin wrapper over `Signal<Page>` whose equality is [`pages_equal`], so a
/// response carrying the same page does not re-render anything. The store does
/// not validate pages; the navigation layer does that before writing.
///
/// ```
/// use pagewire_client::store::PageStore;
/// use pagewire_core::Page;
/// use serde_json::json;
///
/// let store = PageStore::new(Page::new("Home", "/").with_prop("n", json!(1)));
/// assert!(!store.set(Page::new("Home", "/").with_prop("n", json!(1.0))));
/// assert!(store.set(Page::new("About", "/about")));
/// ```
#[derive(Clone, Debug)]
pub struct PageStore {
	signal: Signal<Page>,
}

impl PageStore {
	/// Creates the store.
	pub fn new(page: Page) -> Self {
		Self {
			signal: Signal::with_equality(page, pages_equal),
		}
	}

	/// Current page, tracked.
	pub fn get(&self) -> Page {
		self.signal.get()
	}

	/// Current page, untracked.
	pub fn get_untracked(&self) -> Page {
		self.signal.get_untracked()
	}

	/// Borrows the current page without tracking.
	pub fn with_untracked<R>(&self, f: impl FnOnce(&Page) -> R) -> R {
		self.signal.with_untracked(f)
	}

	/// Replaces the page. Returns `false` if it was semantically unchanged.
	pub fn set(&self, page: Page) -> bool {
		tracing::trace!(component = %page.component, url = %page.url, "page store write");
		self.signal.set(page)
	}

	/// Runs `callback` now and on every page change.
	pub fn subscribe<F>(&self, callback: F) -> Effect
	where
		F: FnMut(&Page) + 'static,
	{
		self.signal.subscribe(callback)
	}

	/// The underlying signal.
	pub fn signal(&self) -> &Signal<Page> {
		&self.signal
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use serial_test::serial;
	use std::cell::Cell;
	use std::rc::Rc;

	#[test]
	#[serial]
	fn test_identical_payload_does_not_notify() {
		let store = PageStore::new(Page::new("Users", "/users").with_prop("list", json!([1, 2])));
		let renders = Rc::new(Cell::new(0));
		let _sub = store.subscribe({
			let renders = renders.clone();
			move |_| renders.set(renders.get() + 1)
		});

		store.set(Page::new("Users", "/users").with_prop("list", json!([1, 2])));
		assert_eq!(renders.get(), 1);

		store.set(Page::new("Users", "/users").with_prop("list", json!([1, 2, 3])));
		assert_eq!(renders.get(), 2);
	}

	#[test]
	#[serial]
	fn test_large_integer_change_is_committed() {
		let store = PageStore::new(Page::new("Users/Show", "/users/1").with_prop("id", json!(9007199254740993_u64)));

		assert!(store.set(Page::new("Users/Show", "/users/1").with_prop("id", json!(9007199254740992_u64))));
		assert_eq!(store.get_untracked().prop("id"), Some(&json!(9007199254740992_u64)));
	}
}
