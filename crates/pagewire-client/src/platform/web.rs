//! `web-sys` browser.

use std::cell::RefCell;

use js_sys::{JSON, Uint8Array};
use pagewire_core::ScrollPosition;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlElement, HtmlIFrameElement, PopStateEvent, Storage, Window};

use super::{Browser, PopStateHandler, StoredState};

const SCROLL_REGION_SELECTOR: &str = "[scroll-region]";

type PopStateClosure = Closure<dyn FnMut(PopStateEvent)>;

/// [`Browser`] backed by the real window.
#[derive(Default)]
pub struct WebBrowser {
	popstate: RefCell<Option<PopStateClosure>>,
}

impl WebBrowser {
	/// Creates a browser bound to the global `window`.
	pub fn new() -> Self {
		Self::default()
	}

	fn window(&self) -> Option<Window> {
		web_sys::window()
	}

	fn document(&self) -> Option<Document> {
		self.window()?.document()
	}

	fn storage(&self) -> Option<Storage> {
		self.window()?.session_storage().ok().flatten()
	}

	fn scroll_region_elements(&self) -> Vec<Element> {
		let Some(nodes) = self
			.document()
			.and_then(|d| d.query_selector_all(SCROLL_REGION_SELECTOR).ok())
		else {
			return Vec::new();
		};
		(0..nodes.length())
			.filter_map(|i| nodes.get(i))
			.filter_map(|node| node.dyn_into::<Element>().ok())
			.collect()
	}
}

fn to_js(state: &StoredState) -> JsValue {
	match state {
		StoredState::Plain(value) => serde_json::to_string(value)
			.ok()
			.and_then(|json| JSON::parse(&json).ok())
			.unwrap_or(JsValue::NULL),
		StoredState::Encrypted(bytes) => Uint8Array::from(bytes.as_slice()).into(),
	}
}

fn from_js(value: JsValue) -> Option<StoredState> {
	if value.is_null() || value.is_undefined() {
		return None;
	}
	if value.is_instance_of::<Uint8Array>() {
		return Some(StoredState::Encrypted(Uint8Array::new(&value).to_vec()));
	}
	let json: String = JSON::stringify(&value).ok()?.into();
	serde_json::from_str(&json).ok().map(StoredState::Plain)
}

impl Browser for WebBrowser {
	fn push_state(&self, state: StoredState, url: &str) {
		let result = self
			.window()
			.and_then(|w| w.history().ok())
			.map(|h| h.push_state_with_url(&to_js(&state), "", Some(url)));
		if !matches!(result, Some(Ok(()))) {
			tracing::warn!(url, "history.pushState failed");
		}
	}

	fn replace_state(&self, state: StoredState, url: &str) {
		let result = self
			.window()
			.and_then(|w| w.history().ok())
			.map(|h| h.replace_state_with_url(&to_js(&state), "", Some(url)));
		if !matches!(result, Some(Ok(()))) {
			tracing::warn!(url, "history.replaceState failed");
		}
	}

	fn current_state(&self) -> Option<StoredState> {
		let state = self.window()?.history().ok()?.state().ok()?;
		from_js(state)
	}

	fn session_get(&self, key: &str) -> Option<String> {
		self.storage()?.get_item(key).ok().flatten()
	}

	fn session_set(&self, key: &str, value: &str) {
		let stored = self.storage().map(|storage| storage.set_item(key, value));
		if !matches!(stored, Some(Ok(()))) {
			tracing::warn!(key, "sessionStorage.setItem failed");
		}
	}

	fn session_remove(&self, key: &str) {
		if let Some(storage) = self.storage() {
			let _ = storage.remove_item(key);
		}
	}

	fn location(&self) -> String {
		self.window()
			.and_then(|w| w.location().href().ok())
			.unwrap_or_default()
	}

	fn hard_visit(&self, url: &str) {
		let navigated = self.window().map(|w| w.location().set_href(url));
		if !matches!(navigated, Some(Ok(()))) {
			tracing::error!(url, "hard visit failed");
		}
	}

	fn scroll_to_top(&self) {
		if let Some(window) = self.window() {
			window.scroll_to_with_x_and_y(0.0, 0.0);
		}
		for element in self.scroll_region_elements() {
			element.set_scroll_top(0);
			element.set_scroll_left(0);
		}
	}

	fn scroll_regions(&self) -> Vec<ScrollPosition> {
		self.scroll_region_elements()
			.iter()
			.map(|element| ScrollPosition {
				top: f64::from(element.scroll_top()),
				left: f64::from(element.scroll_left()),
			})
			.collect()
	}

	fn restore_scroll_regions(&self, regions: &[ScrollPosition]) {
		for (element, position) in self.scroll_region_elements().iter().zip(regions) {
			element.set_scroll_top(position.top as i32);
			element.set_scroll_left(position.left as i32);
		}
	}

	fn is_hidden(&self) -> bool {
		self.document().is_some_and(|d| d.hidden())
	}

	fn show_error_page(&self, html: &str) {
		let Some(document) = self.document() else {
			return;
		};
		let Some(body) = document.body() else {
			return;
		};
		let overlay = match document.create_element("div") {
			Ok(element) => element,
			Err(_) => return,
		};
		let frame = match document
			.create_element("iframe")
			.map(|e| e.unchecked_into::<HtmlIFrameElement>())
		{
			Ok(frame) => frame,
			Err(_) => return,
		};

		if let Some(overlay) = overlay.dyn_ref::<HtmlElement>() {
			let style = overlay.style();
			for (name, value) in [
				("position", "fixed"),
				("inset", "0"),
				("padding", "50px"),
				("background", "rgba(0, 0, 0, 0.6)"),
				("z-index", "200000"),
				("box-sizing", "border-box"),
			] {
				let _ = style.set_property(name, value);
			}
		}
		let frame_style = frame.style();
		let _ = frame_style.set_property("width", "100%");
		let _ = frame_style.set_property("height", "100%");
		let _ = frame_style.set_property("background", "white");
		let _ = frame_style.set_property("border-radius", "5px");
		frame.set_srcdoc(html);

		let dismiss = Closure::once_into_js({
			let overlay = overlay.clone();
			move || overlay.remove()
		});
		let _ = overlay.add_event_listener_with_callback("click", dismiss.unchecked_ref());

		let _ = overlay.append_child(&frame);
		let _ = body.append_child(&overlay);
	}

	fn has_element(&self, id: &str) -> bool {
		self.document()
			.and_then(|d| d.get_element_by_id(id))
			.is_some()
	}

	fn element_attribute(&self, id: &str, name: &str) -> Option<String> {
		self.document()?.get_element_by_id(id)?.get_attribute(name)
	}

	fn set_popstate_handler(&self, handler: Option<PopStateHandler>) {
		let Some(window) = self.window() else {
			return;
		};
		if let Some(previous) = self.popstate.borrow_mut().take() {
			let _ = window
				.remove_event_listener_with_callback("popstate", previous.as_ref().unchecked_ref());
		}
		let Some(handler) = handler else {
			return;
		};
		let closure = PopStateClosure::new(move |event: PopStateEvent| {
			handler(from_js(event.state()));
		});
		if window
			.add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref())
			.is_ok()
		{
			*self.popstate.borrow_mut() = Some(closure);
		}
	}
}
