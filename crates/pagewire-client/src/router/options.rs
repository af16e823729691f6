use std::rc::Rc;

use ::http::Method;
use pagewire_core::Page;
use pagewire_core::value::has_files;
use serde_json::Value;

use crate::error::ClientError;
use crate::form::{to_multipart, to_query};
use crate::http::{HttpRequest, RequestBody};
use crate::prefetch::CacheFor;

type BeforeCallback = Rc<dyn Fn(&HttpRequest) -> bool>;
type StartCallback = Rc<dyn Fn(&HttpRequest)>;
type SuccessCallback = Rc<dyn Fn(&Page)>;
type ErrorCallback = Rc<dyn Fn(&ClientError)>;
type FinishCallback = Rc<dyn Fn()>;

/// Protocol options travelling with a request, read back by the navigation
/// extension when the response arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationMeta {
	/// Props to include in a partial reload.
	pub only: Vec<String>,
	/// Props to exclude from a partial reload.
	pub except: Vec<String>,
	/// Merge props to replace instead of merging.
	pub reset: Vec<String>,
	/// Error bag for validation errors.
	pub error_bag: Option<String>,
	/// Keep the scroll position.
	pub preserve_scroll: bool,
	/// Keep the current URL in the address bar.
	pub preserve_url: bool,
	/// Force replace (`Some(true)`) or push (`Some(false)`).
	pub replace: Option<bool>,
	/// Always replace the current entry.
	pub preserve_history: bool,
}

impl NavigationMeta {
	/// Whether the request asks for a subset of props.
	pub fn is_partial(&self) -> bool {
		!self.only.is_empty() || !self.except.is_empty()
	}
}

/// Options for [`Router::visit`](crate::router::Router::visit).
///
/// ```
/// use pagewire_client::router::VisitOptions;
/// use http::Method;
/// use serde_json::json;
///
/// let options = VisitOptions::new()
///     .method(Method::POST)
///     .data(json!({"name": "Ada"}))
///     .only(["users"])
///     .preserve_scroll(true);
/// assert_eq!(options.meta().only, vec!["users".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct VisitOptions {
	method: Method,
	data: Option<Value>,
	headers: Vec<(String, String)>,
	meta: NavigationMeta,
	preserve_scroll: Option<bool>,
	cache_for: Option<CacheFor>,
	on_before: Option<BeforeCallback>,
	on_start: Option<StartCallback>,
	on_success: Option<SuccessCallback>,
	on_error: Option<ErrorCallback>,
	on_finish: Option<FinishCallback>,
}

/// Lifecycle callbacks split off a [`VisitOptions`].
#[derive(Clone, Default)]
pub(crate) struct VisitCallbacks {
	pub(crate) on_before: Option<BeforeCallback>,
	pub(crate) on_start: Option<StartCallback>,
	pub(crate) on_success: Option<SuccessCallback>,
	pub(crate) on_error: Option<ErrorCallback>,
	pub(crate) on_finish: Option<FinishCallback>,
}

impl VisitOptions {
	/// A `GET` visit with default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// HTTP method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	/// Request data: the query string for `GET`, the body otherwise.
	pub fn data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	/// Extra request header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	/// Partial reload: only these props.
	pub fn only<I, S>(mut self, props: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.meta.only = props.into_iter().map(Into::into).collect();
		self
	}

	/// Partial reload: everything but these props.
	pub fn except<I, S>(mut self, props: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.meta.except = props.into_iter().map(Into::into).collect();
		self
	}

	/// Merge props to replace rather than merge.
	pub fn reset<I, S>(mut self, props: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.meta.reset = props.into_iter().map(Into::into).collect();
		self
	}

	/// Error bag.
	pub fn error_bag(mut self, bag: impl Into<String>) -> Self {
		self.meta.error_bag = Some(bag.into());
		self
	}

	/// Keep the scroll position instead of resetting it to the top.
	pub fn preserve_scroll(mut self, preserve: bool) -> Self {
		self.preserve_scroll = Some(preserve);
		self
	}

	/// Keep the current URL.
	pub fn preserve_url(mut self, preserve: bool) -> Self {
		self.meta.preserve_url = preserve;
		self
	}

	/// Replace (`true`) or push (`false`) the history entry.
	pub fn replace(mut self, replace: bool) -> Self {
		self.meta.replace = Some(replace);
		self
	}

	/// Never push a new history entry.
	pub fn preserve_history(mut self, preserve: bool) -> Self {
		self.meta.preserve_history = preserve;
		self
	}

	/// Prefetch lifetime for this request.
	pub fn cache_for(mut self, cache_for: CacheFor) -> Self {
		self.cache_for = Some(cache_for);
		self
	}

	/// Called before sending; returning `false` cancels the visit.
	pub fn on_before(mut self, f: impl Fn(&HttpRequest) -> bool + 'static) -> Self {
		self.on_before = Some(Rc::new(f));
		self
	}

	/// Called right before the request is sent.
	pub fn on_start(mut self, f: impl Fn(&HttpRequest) + 'static) -> Self {
		self.on_start = Some(Rc::new(f));
		self
	}

	/// Called with the committed page.
	pub fn on_success(mut self, f: impl Fn(&Page) + 'static) -> Self {
		self.on_success = Some(Rc::new(f));
		self
	}

	/// Called when the visit fails.
	pub fn on_error(mut self, f: impl Fn(&ClientError) + 'static) -> Self {
		self.on_error = Some(Rc::new(f));
		self
	}

	/// Called after success or failure.
	pub fn on_finish(mut self, f: impl Fn() + 'static) -> Self {
		self.on_finish = Some(Rc::new(f));
		self
	}

	/// Protocol options as they will travel with the request.
	pub fn meta(&self) -> &NavigationMeta {
		&self.meta
	}

	pub(crate) fn scroll_default(mut self, preserve: bool) -> Self {
		self.preserve_scroll.get_or_insert(preserve);
		self
	}

	/// Builds the request, returning the callbacks separately.
	///
	/// `GET` data goes to the query string. Other methods send JSON, or
	/// multipart when the data holds files; multipart `PUT`/`PATCH`/`DELETE`
	/// are sent as `POST` with a `_method` field.
	pub(crate) fn into_request(self, url: &str) -> Result<(HttpRequest, VisitCallbacks), ClientError> {
		let mut meta = self.meta;
		meta.preserve_scroll = self.preserve_scroll.unwrap_or(false);

		let (method, url, body) = match (self.method, self.data) {
			(method, Some(data)) if method == Method::GET => {
				let query = to_query(&data).map_err(|e| ClientError::InvalidBody(e.to_string()))?;
				(Method::GET, append_query(url, &query), RequestBody::Empty)
			}
			(method, Some(data)) if has_files(&data) => {
				let mut form = to_multipart(&data);
				let method = if method == Method::PUT || method == Method::PATCH || method == Method::DELETE {
					form.push("_method", crate::http::Part::Text(method.as_str().to_lowercase()));
					Method::POST
				} else {
					method
				};
				(method, url.to_string(), RequestBody::Multipart(form))
			}
			(method, Some(data)) => (method, url.to_string(), RequestBody::Json(data)),
			(method, None) => (method, url.to_string(), RequestBody::Empty),
		};

		let mut request = HttpRequest::new(method, url).with_body(body).with_extension(meta);
		if let Some(cache_for) = self.cache_for {
			request.extensions.insert(cache_for);
		}
		for (name, value) in &self.headers {
			request.insert_header(name, value)?;
		}

		let callbacks = VisitCallbacks {
			on_before: self.on_before,
			on_start: self.on_start,
			on_success: self.on_success,
			on_error: self.on_error,
			on_finish: self.on_finish,
		};
		Ok((request, callbacks))
	}
}

impl std::fmt::Debug for VisitOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VisitOptions")
			.field("method", &self.method)
			.field("data", &self.data)
			.field("headers", &self.headers)
			.field("meta", &self.meta)
			.field("preserve_scroll", &self.preserve_scroll)
			.field("cache_for", &self.cache_for)
			.finish_non_exhaustive()
	}
}

fn append_query(url: &str, query: &str) -> String {
	if query.is_empty() {
		return url.to_string();
	}
	let (base, fragment) = match url.split_once('#') {
		Some((base, fragment)) => (base, Some(fragment)),
		None => (url, None),
	};
	let separator = if base.contains('?') { '&' } else { '?' };
	match fragment {
		Some(fragment) => format!("{base}{separator}{query}#{fragment}"),
		None => format!("{base}{separator}{query}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pagewire_core::FileBlob;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("/users", "page=2", "/users?page=2")]
	#[case("/users?sort=name", "page=2", "/users?sort=name&page=2")]
	#[case("/users#top", "page=2", "/users?page=2#top")]
	#[case("/users", "", "/users")]
	fn test_append_query(#[case] url: &str, #[case] query: &str, #[case] expected: &str) {
		assert_eq!(append_query(url, query), expected);
	}

	#[rstest]
	fn test_get_data_goes_to_query_string() {
		let (request, _) = VisitOptions::new()
			.data(json!({"filter": {"role": "admin"}, "page": 2}))
			.into_request("/users")
			.unwrap();

		assert_eq!(request.url, "/users?filter%5Brole%5D=admin&page=2");
		assert_eq!(request.body, RequestBody::Empty);
	}

	#[rstest]
	fn test_multipart_put_is_spoofed() {
		let (request, _) = VisitOptions::new()
			.method(Method::PUT)
			.data(json!({"avatar": FileBlob::new("a.png", "image/png", vec![1, 2]).to_value()}))
			.into_request("/profile")
			.unwrap();

		assert_eq!(request.method, Method::POST);
		let RequestBody::Multipart(form) = &request.body else {
			panic!("expected multipart body");
		};
		assert_eq!(form.get_text("_method"), Some("put"));
	}

	#[rstest]
	fn test_json_body_and_meta_extension() {
		let (request, _) = VisitOptions::new()
			.method(Method::POST)
			.data(json!({"name": "Ada"}))
			.only(["users"])
			.header("X-Trace", "abc")
			.into_request("/users")
			.unwrap();

		assert_eq!(request.body, RequestBody::Json(json!({"name": "Ada"})));
		assert_eq!(request.header("x-trace"), Some("abc"));
		assert_eq!(request.extensions.get::<NavigationMeta>().unwrap().only, vec!["users"]);
	}
}
