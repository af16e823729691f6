use ::http::{Extensions, HeaderMap, Method, StatusCode};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// The request a response answers, as it was when the response was consumed.
///
/// A response served from the prefetch cache carries the config of the request
/// that consumed it, so `prefetch` is `false` there even though the network
/// call was a prefetch.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
	/// HTTP method.
	pub method: Method,
	/// Requested URL.
	pub url: String,
	/// Whether the consuming request was a prefetch.
	pub prefetch: bool,
	/// Typed per-request data.
	pub extensions: Extensions,
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
	/// Status code.
	pub status: StatusCode,
	/// Headers.
	pub headers: HeaderMap,
	/// Body bytes.
	pub body: Bytes,
	/// Effective request config.
	pub config: RequestConfig,
}

impl HttpResponse {
	/// A response with an empty config.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
		Self {
			status,
			headers,
			body: body.into(),
			config: RequestConfig::default(),
		}
	}

	/// Replaces the config.
	pub fn with_config(mut self, config: RequestConfig) -> Self {
		self.config = config;
		self
	}

	/// Whether the status is 2xx.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Header value as a string.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Body decoded as JSON.
	pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
		serde_json::from_slice(&self.body).map_err(|e| ClientError::InvalidBody(e.to_string()))
	}

	/// Body as (lossy) UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}
