//! Application bootstrap.
//!
//! The server embeds the initial page in the mount element:
//!
//! ```html
//! <div id="app" data-page='{"component":"Home","props":{},"url":"/"}'></div>
//! ```
//!
//! [`App::boot`] reads that payload, builds the session and router, writes the
//! initial history entry and wires back/forward navigation. The caller then
//! mounts its UI with [`App::mount`].
//!
//! ```
//! use std::rc::Rc;
//! use pagewire_client::app::{App, AppOptions};
//! use pagewire_client::platform::MemoryBrowser;
//! use pagewire_client::testing::MockTransport;
//!
//! let browser = MemoryBrowser::new("/").with_element(
//! 	"app",
//! 	[("data-page", r#"{"component":"Home","props":{},"url":"/"}"#)],
//! );
//! let app = App::boot(AppOptions::new(Rc::new(browser), Rc::new(MockTransport::new()))).unwrap();
//! app.mount(|app| assert_eq!(app.router().page().component, "Home"));
//! ```

use std::rc::Rc;

use pagewire_core::{Page, PageError};

use crate::config::{ClientConfig, ConfigError};
use crate::context::Session;
use crate::http::Transport;
use crate::platform::Browser;
use crate::router::{Router, RouterError};
use crate::time::{Clock, SystemClock};

/// Attribute holding the initial page JSON.
pub const PAGE_ATTRIBUTE: &str = "data-page";
/// Optional attribute holding client configuration JSON.
pub const CONFIG_ATTRIBUTE: &str = "data-config";

/// Bootstrap failures. All of them are setup mistakes in the host document.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
	/// No element with the configured root id.
	#[error("mount element #{0} not found")]
	MissingRoot(String),
	/// The root element has no page payload.
	#[error("mount element #{0} has no data-page payload")]
	MissingPayload(String),
	/// The payload is not a valid page.
	#[error("initial page payload is invalid: {0}")]
	InvalidPayload(#[from] PageError),
	/// Client configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The router could not be created.
	#[error(transparent)]
	Router(#[from] RouterError),
}

/// Inputs to [`App::boot`].
pub struct AppOptions {
	browser: Rc<dyn Browser>,
	transport: Rc<dyn Transport>,
	config: Option<ClientConfig>,
	clock: Rc<dyn Clock>,
}

impl AppOptions {
	/// Options over an explicit browser and transport.
	pub fn new(browser: Rc<dyn Browser>, transport: Rc<dyn Transport>) -> Self {
		Self {
			browser,
			transport,
			config: None,
			clock: Rc::new(SystemClock),
		}
	}

	/// Options for the real document and a default `reqwest` client.
	#[cfg(all(target_family = "wasm", target_os = "unknown"))]
	pub fn web() -> Self {
		Self::new(
			Rc::new(crate::platform::WebBrowser::new()),
			Rc::new(crate::http::ReqwestTransport::new()),
		)
	}

	/// Uses this configuration instead of the one embedded in the document.
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = Some(config);
		self
	}

	/// Uses this clock for cache freshness.
	pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}
}

impl std::fmt::Debug for AppOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppOptions")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

/// A booted application.
#[derive(Debug, Clone)]
pub struct App {
	router: Router,
}

impl App {
	/// Reads the initial page and starts the runtime.
	///
	/// When the current history entry already holds this URL (a reload, or a
	/// return to the tab) its page and remembered state are restored;
	/// otherwise the payload is written as the current entry. Deferred props
	/// of the initial page are requested afterwards.
	pub fn boot(options: AppOptions) -> Result<Self, BootError> {
		let AppOptions {
			browser,
			transport,
			config,
			clock,
		} = options;

		let config = match config {
			Some(config) => {
				config.validate()?;
				config
			}
			None => embedded_config(browser.as_ref())?,
		};
		let root_id = config.bootstrap.root_id.clone();
		if !browser.has_element(&root_id) {
			return Err(BootError::MissingRoot(root_id));
		}
		let payload = browser
			.element_attribute(&root_id, PAGE_ATTRIBUTE)
			.ok_or_else(|| BootError::MissingPayload(root_id.clone()))?;
		let page = Page::from_json(&payload)?;

		let session = Session::with_clock(config, browser.clone(), clock);
		let history = session.history();
		let page = match browser.current_state().map(|state| history.decode(&state)) {
			Some(Ok(entry)) if entry.page.url == page.url => {
				tracing::debug!(url = %page.url, "restoring initial page from history");
				session.remember().restore(entry.remember);
				browser.restore_scroll_regions(&entry.scroll_regions);
				entry.page
			}
			Some(Err(error)) => {
				tracing::warn!(%error, "current history entry unreadable; using server payload");
				page
			}
			_ => page,
		};

		let router = Router::new(session, transport, page)?;
		if let Err(error) = history.push_or_replace(&router.page(), true) {
			tracing::warn!(%error, "failed to write the initial history entry");
		}

		let weak = router.downgrade();
		browser.set_popstate_handler(Some(Rc::new(move |state| {
			if let Some(inner) = weak.upgrade() {
				Router::from_inner(inner).handle_popstate(state);
			}
		})));

		let deferred = router.load_deferred_props();
		tracing::debug!(component = %router.page().component, root = %root_id, deferred, "app booted");
		Ok(Self { router })
	}

	/// Hands the app to UI-mounting code.
	pub fn mount<F>(&self, mount: F)
	where
		F: FnOnce(&App),
	{
		mount(self);
	}

	/// The app's router.
	pub fn router(&self) -> &Router {
		&self.router
	}

	/// The app's session.
	pub fn session(&self) -> &Session {
		self.router.session()
	}
}

/// Configuration from the default root element's `data-config`, or defaults.
fn embedded_config(browser: &dyn Browser) -> Result<ClientConfig, ConfigError> {
	let root_id = ClientConfig::default().bootstrap.root_id;
	match browser.element_attribute(&root_id, CONFIG_ATTRIBUTE) {
		Some(source) => ClientConfig::from_json(&source),
		None => Ok(ClientConfig::default()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::{MemoryBrowser, StoredState};
	use crate::testing::MockTransport;
	use rstest::rstest;
	use serde_json::json;
	use serial_test::serial;

	fn browser_with(attributes: Vec<(&'static str, String)>) -> Rc<MemoryBrowser> {
		Rc::new(MemoryBrowser::new("/").with_element("app", attributes))
	}

	fn boot(browser: Rc<MemoryBrowser>) -> Result<App, BootError> {
		App::boot(AppOptions::new(browser, Rc::new(MockTransport::new())))
	}

	#[rstest]
	#[serial(reactive)]
	fn test_missing_root() {
		let browser = Rc::new(MemoryBrowser::new("/"));
		assert!(matches!(boot(browser), Err(BootError::MissingRoot(id)) if id == "app"));
	}

	#[rstest]
	#[serial(reactive)]
	fn test_missing_payload() {
		let browser = browser_with(vec![("class", "shell".to_string())]);
		assert!(matches!(boot(browser), Err(BootError::MissingPayload(_))));
	}

	#[rstest]
	#[serial(reactive)]
	fn test_invalid_payload() {
		let browser = browser_with(vec![(PAGE_ATTRIBUTE, "{\"props\":{}}".to_string())]);
		assert!(matches!(boot(browser), Err(BootError::InvalidPayload(_))));
	}

	#[rstest]
	#[serial(reactive)]
	fn test_boot_writes_initial_entry() {
		let page = json!({"component": "Home", "props": {"n": 1}, "url": "/"});
		let browser = browser_with(vec![(PAGE_ATTRIBUTE, page.to_string())]);
		let app = boot(browser.clone()).unwrap();

		assert_eq!(app.router().page().component, "Home");
		assert_eq!(browser.history_len(), 1);
		assert!(matches!(browser.current_state(), Some(StoredState::Plain(_))));
	}

	#[rstest]
	#[serial(reactive)]
	fn test_embedded_config_is_read() {
		let page = json!({"component": "Home", "props": {}, "url": "/"});
		let browser = browser_with(vec![
			(PAGE_ATTRIBUTE, page.to_string()),
			(CONFIG_ATTRIBUTE, r#"{"poll": {"hidden_throttle": 3}}"#.to_string()),
		]);
		let app = boot(browser).unwrap();
		assert_eq!(app.session().config().poll.hidden_throttle, 3);
	}

	#[rstest]
	#[serial(reactive)]
	fn test_boot_restores_remembered_state_on_reload() {
		let page = json!({"component": "Home", "props": {}, "url": "/"});
		let browser = browser_with(vec![(PAGE_ATTRIBUTE, page.to_string())]);
		let app = boot(browser.clone()).unwrap();
		app.router().remember("draft", json!("hello"));
		drop(app);

		let app = boot(browser).unwrap();
		assert_eq!(app.router().restore("draft"), Some(json!("hello")));
	}

	#[rstest]
	#[serial(reactive)]
	fn test_mount_receives_app() {
		let page = json!({"component": "Dashboard", "props": {}, "url": "/"});
		let app = boot(browser_with(vec![(PAGE_ATTRIBUTE, page.to_string())])).unwrap();
		let mut mounted = None;
		app.mount(|app| mounted = Some(app.router().page().component));
		assert_eq!(mounted.as_deref(), Some("Dashboard"));
	}
}
