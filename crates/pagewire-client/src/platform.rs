//! Browser collaborators.
//!
//! Everything the runtime needs from the host document goes through the
//! [`Browser`] trait: the history API, session storage, scrolling, visibility,
//! hard navigation, the error overlay and the initial payload lookup.
//!
//! - [`MemoryBrowser`]: in-memory implementation for native targets and tests
//! - `WebBrowser`: `web-sys` implementation, only compiled for `wasm32-unknown-unknown`

mod memory;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
mod web;

pub use memory::MemoryBrowser;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
pub use web::WebBrowser;

use std::rc::Rc;

use pagewire_core::ScrollPosition;
use serde_json::Value;

/// What a history entry physically holds.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredState {
	/// Structured `{page, remember, scrollRegions}` data.
	Plain(Value),
	/// AES-GCM ciphertext of the same structure.
	Encrypted(Vec<u8>),
}

/// Called with the state of the entry the user navigated to with back/forward.
pub type PopStateHandler = Rc<dyn Fn(Option<StoredState>)>;

/// Host document operations.
pub trait Browser {
	/// Pushes a new history entry.
	fn push_state(&self, state: StoredState, url: &str);

	/// Overwrites the current history entry.
	fn replace_state(&self, state: StoredState, url: &str);

	/// State of the current history entry, if any.
	fn current_state(&self) -> Option<StoredState>;

	/// Reads a session storage item.
	fn session_get(&self, key: &str) -> Option<String>;

	/// Writes a session storage item.
	fn session_set(&self, key: &str, value: &str);

	/// Deletes a session storage item.
	fn session_remove(&self, key: &str);

	/// Current location (`href`).
	fn location(&self) -> String;

	/// Full page load of `url`, leaving the single-page runtime.
	fn hard_visit(&self, url: &str);

	/// Scrolls the window and every scroll region to the top.
	fn scroll_to_top(&self);

	/// Current offsets of the document's scroll regions.
	fn scroll_regions(&self) -> Vec<ScrollPosition>;

	/// Restores scroll region offsets saved with [`Browser::scroll_regions`].
	fn restore_scroll_regions(&self, regions: &[ScrollPosition]);

	/// Whether the document is in a background tab.
	fn is_hidden(&self) -> bool;

	/// Shows `html` in a dismissible overlay isolated from the host page's styles.
	fn show_error_page(&self, html: &str);

	/// Whether an element with this id exists.
	fn has_element(&self, id: &str) -> bool;

	/// Reads an attribute of the element with this id.
	fn element_attribute(&self, id: &str, name: &str) -> Option<String>;

	/// Installs (or with `None`, removes) the back/forward handler.
	fn set_popstate_handler(&self, handler: Option<PopStateHandler>);
}
