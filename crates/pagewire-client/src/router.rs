//! Navigation.
//!
//! A [`Router`] ties a [`Session`], a [`Client`] and the [`PageStore`]
//! together. Visits are ordinary requests carrying a [`NavigationMeta`]; the
//! [`NavigationExtension`] installed on the client tags them with protocol
//! headers and, when the response arrives, reconciles the new page, commits
//! the history entry and updates the store before the visit resolves.
//!
//! ```no_run
//! use pagewire_client::context::Session;
//! use pagewire_client::http::ReqwestTransport;
//! use pagewire_client::router::{Router, VisitOptions};
//! use pagewire_core::Page;
//! use std::rc::Rc;
//!
//! # async fn run() -> Result<(), pagewire_client::router::RouterError> {
//! let session = Session::in_memory("/");
//! let router = Router::new(session, Rc::new(ReqwestTransport::new()), Page::new("Home", "/"))?;
//! router.visit("/users", VisitOptions::new().only(["users"])).await?;
//! # Ok(())
//! # }
//! ```

pub mod headers;
mod merge;
mod navigation;
mod options;

pub use merge::reconcile;
pub use navigation::NavigationExtension;
pub use options::{NavigationMeta, VisitOptions};

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use ::http::Method;
use pagewire_core::spawn::spawn_local;
use pagewire_core::{Page, PageError};
use serde_json::Value;

use crate::context::Session;
use crate::error::ClientError;
use crate::history::HistoryError;
use crate::http::{Client, Extension, HttpResponse, Teardown, Transport};
use crate::platform::StoredState;
use crate::prefetch::{CacheFor, PrefetchError};
use crate::store::PageStore;
use crate::triggers::{HoverPrefetch, Poll, WhenVisible};

/// Errors returned by router operations.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
	/// The request failed or was rejected.
	#[error(transparent)]
	Client(#[from] ClientError),
	/// A page payload is invalid.
	#[error(transparent)]
	Page(#[from] PageError),
	/// A history entry could not be written.
	#[error(transparent)]
	History(#[from] HistoryError),
	/// Prefetch configuration is invalid.
	#[error(transparent)]
	Prefetch(#[from] PrefetchError),
}

impl RouterError {
	/// The server response behind a failed visit, if any.
	pub fn response(&self) -> Option<&HttpResponse> {
		match self {
			Self::Client(error) => error.response(),
			_ => None,
		}
	}
}

/// How a visit ended.
#[derive(Debug)]
pub enum VisitOutcome {
	/// The page was committed.
	Completed {
		/// The committed page.
		page: Page,
		/// The response it came from.
		response: HttpResponse,
	},
	/// The server asked for a full page load of this URL; it has been started.
	Redirected(String),
	/// `on_before` cancelled the visit.
	Cancelled,
}

pub(crate) struct RouterInner {
	session: Session,
	client: Client,
	store: PageStore,
	navigation: RefCell<Option<Teardown>>,
}

/// Client-side navigation over server-rendered pages. Clones share state.
#[derive(Clone)]
pub struct Router {
	inner: Rc<RouterInner>,
}

impl Router {
	/// Creates a router showing `page` and installs the navigation extension on
	/// a fresh client over `transport`.
	pub fn new(session: Session, transport: Rc<dyn Transport>, page: Page) -> Result<Self, RouterError> {
		page.validate()?;
		let cache_for = CacheFor::parse(&session.config().prefetch.default_cache_for)?;
		let client = Client::new(transport, session.prefetch());
		client.set_default_cache_for(cache_for);

		let inner = Rc::new_cyclic(|weak| {
			let navigation = NavigationExtension::new(weak.clone()).install(&client);
			RouterInner {
				session,
				client,
				store: PageStore::new(page),
				navigation: RefCell::new(Some(navigation)),
			}
		});
		Ok(Self { inner })
	}

	pub(crate) fn from_inner(inner: Rc<RouterInner>) -> Self {
		Self { inner }
	}

	pub(crate) fn downgrade(&self) -> Weak<RouterInner> {
		Rc::downgrade(&self.inner)
	}

	/// The session.
	pub fn session(&self) -> &Session {
		&self.inner.session
	}

	/// The request pipeline.
	pub fn client(&self) -> &Client {
		&self.inner.client
	}

	/// The page store.
	pub fn store(&self) -> &PageStore {
		&self.inner.store
	}

	/// The current page, untracked.
	pub fn page(&self) -> Page {
		self.inner.store.get_untracked()
	}

	/// Visits `url`.
	///
	/// Resolves once the response is reconciled, the history entry written and
	/// the store updated. Deferred prop loads it triggers are not awaited.
	pub async fn visit(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		let options = options.scroll_default(self.session().config().scroll.preserve_default);
		let (request, callbacks) = options.into_request(url)?;

		if let Some(on_before) = &callbacks.on_before {
			if !on_before(&request) {
				tracing::debug!(url = %request.url, "visit cancelled by on_before");
				return Ok(VisitOutcome::Cancelled);
			}
		}
		if let Some(on_start) = &callbacks.on_start {
			on_start(&request);
		}

		let outcome = match self.inner.client.send(request).await {
			Ok(response) => {
				let location = response.header(headers::LOCATION).map(str::to_string);
				match location {
					Some(location) => Ok(VisitOutcome::Redirected(location)),
					None => {
						let page = self.page();
						if let Some(on_success) = &callbacks.on_success {
							on_success(&page);
						}
						Ok(VisitOutcome::Completed { page, response })
					}
				}
			}
			Err(error) => {
				if let Some(on_error) = &callbacks.on_error {
					on_error(&error);
				}
				Err(RouterError::Client(error))
			}
		};

		if let Some(on_finish) = &callbacks.on_finish {
			on_finish();
		}
		outcome
	}

	/// Visits the current URL again, keeping the scroll position by default.
	pub async fn reload(&self, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		let url = self.inner.store.with_untracked(|page| page.url.clone());
		self.visit(&url, options.scroll_default(true)).await
	}

	/// `GET` visit.
	pub async fn get(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		self.visit(url, options.method(Method::GET)).await
	}

	/// `POST` visit with `data`.
	pub async fn post(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		self.visit(url, options.method(Method::POST).data(data)).await
	}

	/// `PUT` visit with `data`.
	pub async fn put(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		self.visit(url, options.method(Method::PUT).data(data)).await
	}

	/// `PATCH` visit with `data`.
	pub async fn patch(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		self.visit(url, options.method(Method::PATCH).data(data)).await
	}

	/// `DELETE` visit.
	pub async fn delete(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, RouterError> {
		self.visit(url, options.method(Method::DELETE)).await
	}

	/// Fetches `url` into the prefetch cache without touching the page.
	///
	/// Concurrent prefetches of the same request share one network call. A
	/// later visit of the same request is served from the cache while fresh.
	pub async fn prefetch(
		&self,
		url: &str,
		options: VisitOptions,
		cache_for: Option<CacheFor>,
	) -> Result<(), RouterError> {
		let (mut request, _) = options.into_request(url)?;
		request.prefetch = true;
		if let Some(cache_for) = cache_for {
			request.extensions.insert(cache_for);
		}
		self.inner.client.send(request).await?;
		Ok(())
	}

	/// Replaces the page without a request, rewriting the current history entry.
	pub fn replace_page(&self, page: Page) -> Result<(), RouterError> {
		page.validate()?;
		self.session().history().push_or_replace(&page, true)?;
		self.inner.store.set(page);
		Ok(())
	}

	/// Stores `value` under `key` in the remember table and the current entry.
	pub fn remember(&self, key: &str, value: Value) {
		self.session().remember().insert(key, value);
		self.session().history().sync_remember();
	}

	/// Reads a remembered value.
	pub fn restore(&self, key: &str) -> Option<Value> {
		self.session().remember().get(key)
	}

	/// Restores the entry the user navigated to with back/forward.
	///
	/// An entry that cannot be decoded (for instance because session storage
	/// lost the encryption key) is replaced by a fresh visit of the current
	/// location, keeping the scroll position.
	pub fn handle_popstate(&self, state: Option<StoredState>) {
		let Some(state) = state else {
			tracing::debug!("history entry without state; ignoring");
			return;
		};
		let session = self.session();
		match session.history().decode(&state) {
			Ok(entry) => {
				tracing::debug!(url = %entry.page.url, "restoring page from history");
				session.remember().restore(entry.remember);
				self.inner.store.set(entry.page);
				session.browser().restore_scroll_regions(&entry.scroll_regions);
			}
			Err(error) => {
				let url = session.browser().location();
				tracing::warn!(%error, url = %url, "history entry unreadable; reloading from the server");
				let router = self.clone();
				spawn_local(async move {
					let options = VisitOptions::new().preserve_scroll(true).replace(true);
					if let Err(error) = router.visit(&url, options).await {
						tracing::warn!(%error, url = %url, "reload after history decode failure failed");
					}
				});
			}
		}
	}

	/// Starts one partial reload per deferred prop group of the current page.
	///
	/// Returns the number of groups requested. The reloads run in the
	/// background and each one re-enters the navigation pipeline.
	pub fn load_deferred_props(&self) -> usize {
		let groups = self.inner.store.with_untracked(|page| page.deferred_props.clone());
		for (group, props) in &groups {
			tracing::debug!(group = %group, props = ?props, "loading deferred props");
			let router = self.clone();
			let group = group.clone();
			let options = VisitOptions::new()
				.only(props.clone())
				.preserve_history(true)
				.preserve_scroll(true);
			spawn_local(async move {
				if let Err(error) = router.reload(options).await {
					tracing::warn!(%error, group = %group, "deferred props request failed");
				}
			});
		}
		groups.len()
	}

	/// A poll reloading the current page every `interval`.
	///
	/// Intervals below [`MIN_POLL_INTERVAL`](crate::triggers::MIN_POLL_INTERVAL) are raised to it.
	/// Unless `keep_alive` is set, only one tick in `poll.hidden_throttle`
	/// fires while the document is hidden.
	pub fn poll(&self, interval: Duration, options: VisitOptions, keep_alive: bool) -> Poll {
		Poll::new(self.clone(), interval, options, keep_alive)
	}

	/// A loader reloading `props` when its element becomes visible.
	pub fn when_visible<I, S>(&self, props: I) -> WhenVisible
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		WhenVisible::new(self.clone(), VisitOptions::new().only(props))
	}

	/// A hover trigger prefetching `url` after `prefetch.hover_delay_ms`.
	pub fn prefetch_on_hover(&self, url: &str, options: VisitOptions, cache_for: Option<CacheFor>) -> HoverPrefetch {
		HoverPrefetch::new(self.clone(), url, options, cache_for)
	}

	/// Removes the navigation extension from the client.
	///
	/// Requests sent afterwards are plain requests.
	pub fn detach(&self) {
		let navigation = self.inner.navigation.borrow_mut().take();
		if let Some(navigation) = navigation {
			navigation.run();
		}
	}
}

impl std::fmt::Debug for Router {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.inner
			.store
			.with_untracked(|page| {
				f.debug_struct("Router")
					.field("component", &page.component)
					.field("url", &page.url)
					.field("client", &self.inner.client)
					.finish()
			})
	}
}
