use async_trait::async_trait;

use super::request::{HttpRequest, MultipartForm, Part, RequestBody};
use super::response::HttpResponse;
use crate::error::TransportError;

/// Executes requests on the wire.
///
/// Implementations return every status as `Ok`; the client decides what counts
/// as a failure.
#[async_trait(?Send)]
pub trait Transport {
	/// Sends `request` and buffers the response.
	async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest` (the browser `fetch` API on wasm).
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
	client: reqwest::Client,
	base_url: Option<String>,
}

impl ReqwestTransport {
	/// A transport sending URLs as given.
	pub fn new() -> Self {
		Self::default()
	}

	/// A transport resolving relative URLs against `base_url`.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: Some(base_url.into()),
		}
	}

	fn resolve(&self, url: &str) -> String {
		match &self.base_url {
			Some(base) if url.starts_with('/') => format!("{}{}", base.trim_end_matches('/'), url),
			_ => url.to_string(),
		}
	}

	fn multipart(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
		let mut multipart = reqwest::multipart::Form::new();
		for (name, part) in form.parts() {
			multipart = match part {
				Part::Text(text) => multipart.text(name.clone(), text.clone()),
				Part::File(file) => {
					let part = reqwest::multipart::Part::bytes(file.data.clone())
						.file_name(file.name.clone())
						.mime_str(&file.content_type)
						.map_err(|e| TransportError::Request(e.to_string()))?;
					multipart.part(name.clone(), part)
				}
			};
		}
		Ok(multipart)
	}
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
	async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
		let url = self.resolve(&request.url);
		tracing::trace!(method = %request.method, url = %url, "sending request");

		let builder = self
			.client
			.request(request.method, url)
			.headers(request.headers);
		let builder = match request.body {
			RequestBody::Empty => builder,
			RequestBody::Json(value) => builder.json(&value),
			RequestBody::Multipart(form) => builder.multipart(Self::multipart(form)?),
		};

		let response = builder
			.send()
			.await
			.map_err(|e| TransportError::Network(e.to_string()))?;
		let status = response.status();
		let headers = response.headers().clone();
		let body = response
			.bytes()
			.await
			.map_err(|e| TransportError::Body(e.to_string()))?;
		Ok(HttpResponse::new(status, headers, body))
	}
}
