//! Errors surfaced by the request pipeline.

use crate::http::HttpResponse;
use crate::prefetch::PrefetchError;

/// Failures of the transport itself, before any response is available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	/// The request never produced a response.
	#[error("network error: {0}")]
	Network(String),
	/// The request could not be built.
	#[error("invalid request: {0}")]
	Request(String),
	/// The response body could not be read.
	#[error("failed to read response body: {0}")]
	Body(String),
}

/// Error returned by [`Client::send`](crate::http::Client::send).
///
/// `Clone` so that one failed in-flight prefetch can be handed to every request
/// waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
	/// The transport failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The server answered with a non-2xx status.
	#[error("server answered {} for {}", .0.status, .0.config.url)]
	Status(Box<HttpResponse>),
	/// A header name or value is not valid HTTP.
	#[error("invalid header {name:?}: {message}")]
	InvalidHeader {
		/// Offending header name.
		name: String,
		/// Why it was rejected.
		message: String,
	},
	/// A body could not be encoded or decoded.
	#[error("invalid body: {0}")]
	InvalidBody(String),
	/// Prefetch configuration or cache key failure.
	#[error(transparent)]
	Prefetch(#[from] PrefetchError),
	/// An interceptor refused the response.
	#[error("response rejected: {0}")]
	Rejected(String),
	/// The request was cancelled.
	#[error("request aborted")]
	Aborted,
}

impl ClientError {
	/// The response attached to a [`ClientError::Status`] error.
	pub fn response(&self) -> Option<&HttpResponse> {
		match self {
			Self::Status(response) => Some(response),
			_ => None,
		}
	}
}
