//! In-memory browser.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use pagewire_core::ScrollPosition;

use super::{Browser, PopStateHandler, StoredState};

#[derive(Debug, Clone)]
struct Entry {
	state: Option<StoredState>,
	url: String,
}

/// A [`Browser`] that keeps everything in memory.
///
/// Besides implementing the trait it records what the runtime did (hard visits,
/// error overlays, scroll resets) and can simulate back/forward navigation.
///
/// ```
/// use pagewire_client::platform::{Browser, MemoryBrowser, StoredState};
/// use serde_json::json;
///
/// let browser = MemoryBrowser::new("/a");
/// browser.push_state(StoredState::Plain(json!({"n": 1})), "/b");
/// assert_eq!(browser.location(), "/b");
///
/// browser.back();
/// assert_eq!(browser.location(), "/a");
/// assert_eq!(browser.history_len(), 2);
/// ```
pub struct MemoryBrowser {
	entries: RefCell<Vec<Entry>>,
	index: Cell<usize>,
	session: RefCell<BTreeMap<String, String>>,
	elements: RefCell<HashMap<String, HashMap<String, String>>>,
	hidden: Cell<bool>,
	hard_visits: RefCell<Vec<String>>,
	error_pages: RefCell<Vec<String>>,
	scroll_resets: Cell<usize>,
	regions: RefCell<Vec<ScrollPosition>>,
	popstate: RefCell<Option<PopStateHandler>>,
}

impl MemoryBrowser {
	/// A browser sitting at `url` with an empty history entry.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			entries: RefCell::new(vec![Entry {
				state: None,
				url: url.into(),
			}]),
			index: Cell::new(0),
			session: RefCell::default(),
			elements: RefCell::default(),
			hidden: Cell::new(false),
			hard_visits: RefCell::default(),
			error_pages: RefCell::default(),
			scroll_resets: Cell::new(0),
			regions: RefCell::default(),
			popstate: RefCell::new(None),
		}
	}

	/// Adds an element with the given attributes.
	pub fn with_element<I, K, V>(self, id: impl Into<String>, attributes: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.elements.borrow_mut().insert(
			id.into(),
			attributes
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}

	/// Marks the document hidden or visible.
	pub fn set_hidden(&self, hidden: bool) {
		self.hidden.set(hidden);
	}

	/// Sets the offsets reported by [`Browser::scroll_regions`].
	pub fn set_scroll_regions(&self, regions: Vec<ScrollPosition>) {
		*self.regions.borrow_mut() = regions;
	}

	/// Moves one entry back and fires the popstate handler.
	pub fn back(&self) {
		let index = self.index.get();
		if index > 0 {
			self.go_to(index - 1);
		}
	}

	/// Moves one entry forward and fires the popstate handler.
	pub fn forward(&self) {
		let index = self.index.get();
		if index + 1 < self.entries.borrow().len() {
			self.go_to(index + 1);
		}
	}

	fn go_to(&self, index: usize) {
		self.index.set(index);
		let state = self.entries.borrow()[index].state.clone();
		let handler = self.popstate.borrow().clone();
		if let Some(handler) = handler {
			handler(state);
		}
	}

	/// Number of history entries.
	pub fn history_len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Urls passed to [`Browser::hard_visit`].
	pub fn hard_visits(&self) -> Vec<String> {
		self.hard_visits.borrow().clone()
	}

	/// Documents passed to [`Browser::show_error_page`].
	pub fn error_pages(&self) -> Vec<String> {
		self.error_pages.borrow().clone()
	}

	/// How many times the scroll position was reset.
	pub fn scroll_resets(&self) -> usize {
		self.scroll_resets.get()
	}

	/// Removes all session storage items.
	pub fn clear_session_storage(&self) {
		self.session.borrow_mut().clear();
	}
}

impl Default for MemoryBrowser {
	fn default() -> Self {
		Self::new("/")
	}
}

impl Browser for MemoryBrowser {
	fn push_state(&self, state: StoredState, url: &str) {
		let mut entries = self.entries.borrow_mut();
		let index = self.index.get() + 1;
		entries.truncate(index);
		entries.push(Entry {
			state: Some(state),
			url: url.to_string(),
		});
		self.index.set(index);
	}

	fn replace_state(&self, state: StoredState, url: &str) {
		let mut entries = self.entries.borrow_mut();
		entries[self.index.get()] = Entry {
			state: Some(state),
			url: url.to_string(),
		};
	}

	fn current_state(&self) -> Option<StoredState> {
		self.entries.borrow()[self.index.get()].state.clone()
	}

	fn session_get(&self, key: &str) -> Option<String> {
		self.session.borrow().get(key).cloned()
	}

	fn session_set(&self, key: &str, value: &str) {
		self.session
			.borrow_mut()
			.insert(key.to_string(), value.to_string());
	}

	fn session_remove(&self, key: &str) {
		self.session.borrow_mut().remove(key);
	}

	fn location(&self) -> String {
		self.entries.borrow()[self.index.get()].url.clone()
	}

	fn hard_visit(&self, url: &str) {
		self.hard_visits.borrow_mut().push(url.to_string());
	}

	fn scroll_to_top(&self) {
		self.scroll_resets.set(self.scroll_resets.get() + 1);
		for region in self.regions.borrow_mut().iter_mut() {
			*region = ScrollPosition::default();
		}
	}

	fn scroll_regions(&self) -> Vec<ScrollPosition> {
		self.regions.borrow().clone()
	}

	fn restore_scroll_regions(&self, regions: &[ScrollPosition]) {
		*self.regions.borrow_mut() = regions.to_vec();
	}

	fn is_hidden(&self) -> bool {
		self.hidden.get()
	}

	fn show_error_page(&self, html: &str) {
		self.error_pages.borrow_mut().push(html.to_string());
	}

	fn has_element(&self, id: &str) -> bool {
		self.elements.borrow().contains_key(id)
	}

	fn element_attribute(&self, id: &str, name: &str) -> Option<String> {
		self.elements.borrow().get(id)?.get(name).cloned()
	}

	fn set_popstate_handler(&self, handler: Option<PopStateHandler>) {
		*self.popstate.borrow_mut() = handler;
	}
}
