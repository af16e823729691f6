//! Server configuration.
//!
//! Loaded from an optional TOML file; command-line flags override it.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 13714
//! root_id = "app"
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::SsrError;

/// Where to listen and what to render.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SsrConfig {
	/// Interface to bind.
	pub host: String,
	/// Port to bind.
	pub port: u16,
	/// Id of the element the client mounts into.
	pub root_id: String,
}

impl Default for SsrConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_string(),
			port: 13714,
			root_id: "app".to_string(),
		}
	}
}

impl SsrConfig {
	/// Parses a TOML document.
	pub fn from_toml(source: &str) -> Result<Self, SsrError> {
		Ok(toml::from_str(source)?)
	}

	/// Reads `path`, or returns the defaults when there is none.
	pub fn load(path: Option<&Path>) -> Result<Self, SsrError> {
		match path {
			Some(path) => {
				let source = std::fs::read_to_string(path)?;
				tracing::debug!(path = %path.display(), "loaded configuration file");
				Self::from_toml(&source)
			}
			None => Ok(Self::default()),
		}
	}

	/// Applies command-line overrides.
	pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
		if let Some(host) = host {
			self.host = host;
		}
		if let Some(port) = port {
			self.port = port;
		}
		self
	}

	/// The socket address to bind.
	pub fn addr(&self) -> Result<SocketAddr, SsrError> {
		format!("{}:{}", self.host, self.port)
			.parse()
			.map_err(|_| SsrError::Address(format!("{}:{}", self.host, self.port)))
	}
}
