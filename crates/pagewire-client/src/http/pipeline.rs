use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use futures::FutureExt;
use pagewire_core::spawn::spawn_local;

use super::request::HttpRequest;
use super::response::{HttpResponse, RequestConfig};
use super::transport::Transport;
use crate::error::ClientError;
use crate::prefetch::{CacheFor, CacheLookup, PrefetchCache, SharedResponse, cache_key};

/// Mutates a request before it is sent. Returning an error aborts the send.
pub type RequestInterceptor = Rc<dyn Fn(&mut HttpRequest) -> Result<(), ClientError>>;

/// Extracts field errors from a response, optionally scoped to an error bag.
pub type ErrorResolver = Rc<dyn Fn(&HttpResponse, Option<&str>) -> BTreeMap<String, String>>;

/// Handles responses on their way back to the caller.
///
/// Each interceptor sees the outcome left by the previous one: a success goes
/// to [`on_response`](Self::on_response), a failure to
/// [`on_error`](Self::on_error), and either may turn into the other.
#[async_trait(?Send)]
pub trait ResponseInterceptor {
	/// Called with a successful response.
	async fn on_response(&self, response: HttpResponse) -> Result<HttpResponse, ClientError> {
		Ok(response)
	}

	/// Called with a failure.
	async fn on_error(&self, error: ClientError) -> Result<HttpResponse, ClientError> {
		Err(error)
	}
}

/// Handle returned by interceptor registration, used to eject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterceptorId(u64);

struct ClientInner {
	transport: Rc<dyn Transport>,
	prefetch: PrefetchCache,
	default_cache_for: Cell<CacheFor>,
	next_id: Cell<u64>,
	request_interceptors: RefCell<Vec<(InterceptorId, RequestInterceptor)>>,
	response_interceptors: RefCell<Vec<(InterceptorId, Rc<dyn ResponseInterceptor>)>>,
	error_resolver: RefCell<Option<ErrorResolver>>,
}

/// The request pipeline. Clones share transport, interceptors and cache.
#[derive(Clone)]
pub struct Client {
	inner: Rc<ClientInner>,
}

impl Client {
	/// A client over `transport` using `prefetch` as its response cache.
	pub fn new(transport: Rc<dyn Transport>, prefetch: PrefetchCache) -> Self {
		Self {
			inner: Rc::new(ClientInner {
				transport,
				prefetch,
				default_cache_for: Cell::new(CacheFor::default()),
				next_id: Cell::new(0),
				request_interceptors: RefCell::default(),
				response_interceptors: RefCell::default(),
				error_resolver: RefCell::default(),
			}),
		}
	}

	/// Lifetime of prefetched responses whose request names none.
	pub fn set_default_cache_for(&self, cache_for: CacheFor) {
		self.inner.default_cache_for.set(cache_for);
	}

	/// The prefetch cache.
	pub fn prefetch_cache(&self) -> &PrefetchCache {
		&self.inner.prefetch
	}

	fn next_id(&self) -> InterceptorId {
		let id = self.inner.next_id.get();
		self.inner.next_id.set(id + 1);
		InterceptorId(id)
	}

	/// Appends a request interceptor.
	pub fn on_request<F>(&self, interceptor: F) -> InterceptorId
	where
		F: Fn(&mut HttpRequest) -> Result<(), ClientError> + 'static,
	{
		let id = self.next_id();
		self.inner
			.request_interceptors
			.borrow_mut()
			.push((id, Rc::new(interceptor)));
		id
	}

	/// Appends a response interceptor.
	pub fn on_response(&self, interceptor: Rc<dyn ResponseInterceptor>) -> InterceptorId {
		let id = self.next_id();
		self.inner
			.response_interceptors
			.borrow_mut()
			.push((id, interceptor));
		id
	}

	/// Removes an interceptor. Returns whether it was registered.
	pub fn eject(&self, id: InterceptorId) -> bool {
		let mut removed = false;
		self.inner.request_interceptors.borrow_mut().retain(|(registered, _)| {
			let keep = *registered != id;
			removed |= !keep;
			keep
		});
		self.inner.response_interceptors.borrow_mut().retain(|(registered, _)| {
			let keep = *registered != id;
			removed |= !keep;
			keep
		});
		removed
	}

	/// Number of registered interceptors, requests and responses together.
	pub fn interceptor_count(&self) -> usize {
		self.inner.request_interceptors.borrow().len() + self.inner.response_interceptors.borrow().len()
	}

	/// Installs the resolver used by [`resolve_errors`](Self::resolve_errors).
	///
	/// Only one resolver is active; installing another replaces it.
	pub fn set_error_resolver(&self, resolver: ErrorResolver) {
		let previous = self.inner.error_resolver.borrow_mut().replace(resolver);
		if previous.is_some() {
			tracing::warn!("replacing the installed error resolver; the last registration wins");
		}
	}

	/// Removes the error resolver.
	pub fn clear_error_resolver(&self) {
		self.inner.error_resolver.borrow_mut().take();
	}

	/// Field errors carried by `response`. Empty when no resolver is installed.
	pub fn resolve_errors(&self, response: &HttpResponse, error_bag: Option<&str>) -> BTreeMap<String, String> {
		let resolver = self.inner.error_resolver.borrow().clone();
		match resolver {
			Some(resolver) => resolver(response, error_bag),
			None => BTreeMap::new(),
		}
	}

	/// Sends `request` through the pipeline.
	///
	/// Non-2xx responses become [`ClientError::Status`] before the response
	/// interceptors see them.
	pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, ClientError> {
		let interceptors: Vec<_> = self
			.inner
			.request_interceptors
			.borrow()
			.iter()
			.map(|(_, interceptor)| interceptor.clone())
			.collect();
		for interceptor in interceptors {
			interceptor(&mut request)?;
		}

		let config = request.config();
		let pending = self.resolve(request)?;
		let outcome = with_config(pending.await, config);
		self.intercept_response(outcome).await
	}

	/// Decides where the response comes from.
	///
	/// Sweep, lookup and insert happen without yielding, so two requests for
	/// the same key cannot both miss.
	fn resolve(&self, request: HttpRequest) -> Result<SharedResponse, ClientError> {
		let cache = &self.inner.prefetch;
		cache.sweep();
		let key = cache_key(&request.method, &request.url, &request.body)?;

		match cache.lookup(&key) {
			CacheLookup::Fresh(response) => Ok(response),
			CacheLookup::Stale { response, cache_for } => {
				let cache_for = if request.prefetch {
					self.cache_for(&request)
				} else {
					cache_for
				};
				let url = request.url.clone();
				let prefetch = request.prefetch;
				let mut revalidation = request.config();
				revalidation.prefetch = true;
				let fresh = self.fetch(request);
				cache.insert(key, url, cache_for, fresh.clone());
				if prefetch {
					return Ok(fresh);
				}
				self.revalidate(fresh, revalidation);
				Ok(response)
			}
			CacheLookup::Miss => {
				if request.prefetch {
					let url = request.url.clone();
					let cache_for = self.cache_for(&request);
					let fresh = self.fetch(request);
					cache.insert(key, url, cache_for, fresh.clone());
					Ok(fresh)
				} else {
					Ok(self.fetch(request))
				}
			}
		}
	}

	fn cache_for(&self, request: &HttpRequest) -> CacheFor {
		request
			.extensions
			.get::<CacheFor>()
			.copied()
			.unwrap_or_else(|| self.inner.default_cache_for.get())
	}

	fn fetch(&self, request: HttpRequest) -> SharedResponse {
		let transport = self.inner.transport.clone();
		async move {
			match transport.execute(request).await {
				Ok(response) if response.is_success() => Ok(response),
				Ok(response) => Err(ClientError::Status(Box::new(response))),
				Err(error) => Err(ClientError::Transport(error)),
			}
		}
		.boxed_local()
		.shared()
	}

	/// Completes a background refresh through the response interceptors.
	fn revalidate(&self, fresh: SharedResponse, config: RequestConfig) {
		tracing::debug!(url = %config.url, "revalidating stale prefetched response");
		let client = self.clone();
		spawn_local(async move {
			let outcome = with_config(fresh.await, config);
			if let Err(error) = client.intercept_response(outcome).await {
				tracing::debug!(%error, "background revalidation failed");
			}
		});
	}

	async fn intercept_response(
		&self,
		mut outcome: Result<HttpResponse, ClientError>,
	) -> Result<HttpResponse, ClientError> {
		let interceptors: Vec<_> = self
			.inner
			.response_interceptors
			.borrow()
			.iter()
			.map(|(_, interceptor)| interceptor.clone())
			.collect();
		for interceptor in interceptors {
			outcome = match outcome {
				Ok(response) => interceptor.on_response(response).await,
				Err(error) => interceptor.on_error(error).await,
			};
		}
		outcome
	}
}

fn with_config(
	outcome: Result<HttpResponse, ClientError>,
	config: RequestConfig,
) -> Result<HttpResponse, ClientError> {
	match outcome {
		Ok(response) => Ok(response.with_config(config)),
		Err(ClientError::Status(response)) => Err(ClientError::Status(Box::new(response.with_config(config)))),
		Err(error) => Err(error),
	}
}

impl std::fmt::Debug for Client {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Client")
			.field("request_interceptors", &self.inner.request_interceptors.borrow().len())
			.field("response_interceptors", &self.inner.response_interceptors.borrow().len())
			.field("prefetch_entries", &self.inner.prefetch.len())
			.finish()
	}
}
