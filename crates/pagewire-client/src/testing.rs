//! Test doubles.
//!
//! [`MockTransport`] answers from a routing table and records every request;
//! together with [`MemoryBrowser`](crate::platform::MemoryBrowser) it runs the
//! whole client without a network or a document.
//!
//! ```
//! use pagewire_client::testing::{MockResponse, MockTransport};
//! use pagewire_core::Page;
//!
//! let transport = MockTransport::new();
//! transport.respond("/users", MockResponse::page(&Page::new("Users", "/users")));
//! assert!(transport.calls().is_empty());
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use ::http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use ::http::{HeaderMap, Method, StatusCode};
use async_trait::async_trait;
use bytes::Bytes;
use pagewire_core::Page;
use serde_json::Value;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::router::headers;

/// A scripted answer.
#[derive(Debug, Clone)]
pub struct MockResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Bytes,
}

impl MockResponse {
	/// A JSON body.
	pub fn json(status: u16, body: Value) -> Self {
		Self::raw(status, serde_json::to_vec(&body).unwrap_or_default()).header(CONTENT_TYPE.as_str(), "application/json")
	}

	/// A plain text or HTML body.
	pub fn text(status: u16, body: &str) -> Self {
		Self::raw(status, body.as_bytes().to_vec()).header(CONTENT_TYPE.as_str(), "text/html")
	}

	/// A `200` protocol response carrying `page`.
	pub fn page(page: &Page) -> Self {
		Self::page_with_status(200, page)
	}

	/// A protocol response carrying `page` with any status.
	pub fn page_with_status(status: u16, page: &Page) -> Self {
		let body = serde_json::to_value(page).unwrap_or(Value::Null);
		Self::json(status, body).header(headers::PAGEWIRE, "true")
	}

	/// A `409` asking for a full reload of `location`.
	pub fn location(location: &str) -> Self {
		Self::raw(409, Vec::new()).header(headers::LOCATION, location)
	}

	fn raw(status: u16, body: Vec<u8>) -> Self {
		Self {
			status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
			headers: HeaderMap::new(),
			body: Bytes::from(body),
		}
	}

	/// Adds a header. Invalid names or values are ignored.
	pub fn header(mut self, name: &str, value: &str) -> Self {
		if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
			self.headers.insert(name, value);
		}
		self
	}

	fn into_response(self) -> HttpResponse {
		HttpResponse::new(self.status, self.headers, self.body)
	}
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
	/// Method.
	pub method: Method,
	/// URL as sent.
	pub url: String,
	/// Headers as sent.
	pub headers: HeaderMap,
	/// Body as sent.
	pub body: RequestBody,
}

impl RecordedCall {
	/// Header value as a string.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}
}

/// A [`Transport`] answering from a routing table.
///
/// Routes are matched on the path, ignoring query string and fragment. A route
/// may hold a queue of answers (consumed in order, the last one repeating);
/// unknown routes answer `404`.
#[derive(Debug, Default)]
pub struct MockTransport {
	routes: RefCell<BTreeMap<String, VecDeque<MockResponse>>>,
	calls: RefCell<Vec<RecordedCall>>,
	delay: Cell<Option<Duration>>,
}

impl MockTransport {
	/// An empty routing table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Answers `path` with `response` from now on.
	pub fn respond(&self, path: &str, response: MockResponse) {
		self.routes
			.borrow_mut()
			.insert(path.to_string(), VecDeque::from([response]));
	}

	/// Queues `response` after the answers already scripted for `path`.
	pub fn then_respond(&self, path: &str, response: MockResponse) {
		self.routes
			.borrow_mut()
			.entry(path.to_string())
			.or_default()
			.push_back(response);
	}

	/// Delays every answer.
	pub fn set_delay(&self, delay: Option<Duration>) {
		self.delay.set(delay);
	}

	/// Every request received so far.
	pub fn calls(&self) -> Vec<RecordedCall> {
		self.calls.borrow().clone()
	}

	/// Requests received for `path`.
	pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
		self.calls
			.borrow()
			.iter()
			.filter(|call| route_of(&call.url) == path)
			.cloned()
			.collect()
	}

	fn next_response(&self, path: &str) -> Option<MockResponse> {
		let mut routes = self.routes.borrow_mut();
		let queue = routes.get_mut(path)?;
		if queue.len() > 1 {
			queue.pop_front()
		} else {
			queue.front().cloned()
		}
	}
}

fn route_of(url: &str) -> &str {
	let end = url.find(['?', '#']).unwrap_or(url.len());
	&url[..end]
}

#[async_trait(?Send)]
impl Transport for MockTransport {
	async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
		self.calls.borrow_mut().push(RecordedCall {
			method: request.method.clone(),
			url: request.url.clone(),
			headers: request.headers.clone(),
			body: request.body.clone(),
		});
		if let Some(delay) = self.delay.get() {
			crate::time::sleep(delay).await;
		}
		let response = self
			.next_response(route_of(&request.url))
			.unwrap_or_else(|| MockResponse::text(404, "not found"));
		Ok(response.into_response())
	}
}
