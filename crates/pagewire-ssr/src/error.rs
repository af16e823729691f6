//! Errors of the render server.

use pagewire_core::PageError;

/// Failures of configuration, rendering or serving.
#[derive(Debug, thiserror::Error)]
pub enum SsrError {
	/// Reading the configuration file or binding the socket failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The configuration file is not valid TOML for [`SsrConfig`](crate::SsrConfig).
	#[error("invalid configuration: {0}")]
	Config(#[from] toml::de::Error),
	/// `host:port` does not form a socket address.
	#[error("invalid listen address {0}")]
	Address(String),
	/// The request body is not a page.
	#[error(transparent)]
	Page(#[from] PageError),
	/// The renderer failed.
	#[error("render failed: {0}")]
	Render(String),
	/// The rendered output could not be serialized.
	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
