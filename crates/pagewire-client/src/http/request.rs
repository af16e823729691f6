use ::http::header::{HeaderName, HeaderValue};
use ::http::{Extensions, HeaderMap, Method};
use pagewire_core::FileBlob;
use serde_json::Value;

use super::response::RequestConfig;
use crate::error::ClientError;

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
	/// A text field.
	Text(String),
	/// A file field.
	File(FileBlob),
}

/// An ordered multipart form.
///
/// ```
/// use pagewire_client::http::{MultipartForm, Part};
///
/// let form = MultipartForm::new().text("name", "Ada").text("_method", "put");
/// assert_eq!(form.len(), 2);
/// assert_eq!(form.get_text("_method"), Some("put"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
	parts: Vec<(String, Part)>,
}

impl MultipartForm {
	/// An empty form.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a text field.
	pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.push(name, Part::Text(value.into()));
		self
	}

	/// Appends a file field.
	pub fn file(mut self, name: impl Into<String>, file: FileBlob) -> Self {
		self.push(name, Part::File(file));
		self
	}

	/// Appends a field in place.
	pub fn push(&mut self, name: impl Into<String>, part: Part) {
		self.parts.push((name.into(), part));
	}

	/// Fields in insertion order.
	pub fn parts(&self) -> &[(String, Part)] {
		&self.parts
	}

	/// First text field called `name`.
	pub fn get_text(&self, name: &str) -> Option<&str> {
		self.parts.iter().find_map(|(key, part)| match part {
			Part::Text(text) if key == name => Some(text.as_str()),
			_ => None,
		})
	}

	/// Number of fields.
	pub fn len(&self) -> usize {
		self.parts.len()
	}

	/// Whether the form has no fields.
	pub fn is_empty(&self) -> bool {
		self.parts.is_empty()
	}
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// Serialized as JSON by the transport.
	Json(Value),
	/// Sent as `multipart/form-data`.
	Multipart(MultipartForm),
}

/// An outgoing request as seen by interceptors.
#[derive(Debug, Clone)]
pub struct HttpRequest {
	/// HTTP method.
	pub method: Method,
	/// Target URL, absolute or relative to the transport's base.
	pub url: String,
	/// Headers.
	pub headers: HeaderMap,
	/// Body.
	pub body: RequestBody,
	/// Whether this request only warms the prefetch cache.
	pub prefetch: bool,
	/// Typed per-request data, carried through to the response's config.
	pub extensions: Extensions,
}

impl HttpRequest {
	/// A bodiless request.
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self {
			method,
			url: url.into(),
			headers: HeaderMap::new(),
			body: RequestBody::Empty,
			prefetch: false,
			extensions: Extensions::new(),
		}
	}

	/// A `GET` request.
	pub fn get(url: impl Into<String>) -> Self {
		Self::new(Method::GET, url)
	}

	/// Sets the body.
	pub fn with_body(mut self, body: RequestBody) -> Self {
		self.body = body;
		self
	}

	/// Marks the request as a prefetch.
	pub fn with_prefetch(mut self, prefetch: bool) -> Self {
		self.prefetch = prefetch;
		self
	}

	/// Attaches typed data.
	pub fn with_extension<T>(mut self, value: T) -> Self
	where
		T: Clone + Send + Sync + 'static,
	{
		self.extensions.insert(value);
		self
	}

	/// Sets a header from strings, validating both halves.
	pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), ClientError> {
		let invalid = |message: String| ClientError::InvalidHeader {
			name: name.to_string(),
			message,
		};
		let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
		let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
		self.headers.insert(header_name, header_value);
		Ok(())
	}

	/// Header value as a string, if present and visible ASCII.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// The effective config recorded on the response.
	pub fn config(&self) -> RequestConfig {
		RequestConfig {
			method: self.method.clone(),
			url: self.url.clone(),
			prefetch: self.prefetch,
			extensions: self.extensions.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_insert_header_validates() {
		let mut request = HttpRequest::get("/");
		request.insert_header("X-Pagewire", "true").unwrap();
		assert_eq!(request.header("x-pagewire"), Some("true"));

		let error = request.insert_header("bad header", "x").unwrap_err();
		assert!(matches!(error, ClientError::InvalidHeader { name, .. } if name == "bad header"));
		assert!(request.insert_header("X-Ok", "line\nbreak").is_err());
	}

	#[rstest]
	fn test_config_carries_extensions() {
		#[derive(Clone, Debug, PartialEq)]
		struct Marker(u8);

		let request = HttpRequest::get("/a").with_prefetch(true).with_extension(Marker(7));
		let config = request.config();

		assert!(config.prefetch);
		assert_eq!(config.url, "/a");
		assert_eq!(config.extensions.get::<Marker>(), Some(&Marker(7)));
	}
}
