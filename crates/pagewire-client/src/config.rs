//! Client configuration.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Configuration is usually embedded in host markup as JSON next to the initial
//! page payload, or shipped as TOML with the application.
//!
//! ```
//! use pagewire_client::config::ClientConfig;
//!
//! let config = ClientConfig::from_toml(r#"
//! [prefetch]
//! default_cache_for = "1m"
//!
//! [poll]
//! hidden_throttle = 4
//! "#).unwrap();
//!
//! assert_eq!(config.prefetch.default_cache_for, "1m");
//! assert_eq!(config.poll.hidden_throttle, 4);
//! assert_eq!(config.form.recently_successful_ms, 2000);
//! ```

use serde::{Deserialize, Serialize};

use crate::prefetch::parse_duration;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// JSON source could not be parsed.
	#[error("invalid JSON configuration: {0}")]
	Json(#[from] serde_json::Error),
	/// TOML source could not be parsed.
	#[error("invalid TOML configuration: {0}")]
	Toml(#[from] toml::de::Error),
	/// A value parsed but is out of range.
	#[error("invalid configuration value for {key}: {message}")]
	Invalid {
		/// Dotted key of the offending value.
		key: &'static str,
		/// What is wrong with it.
		message: String,
	},
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Prefetch cache settings.
	pub prefetch: PrefetchConfig,
	/// Form engine settings.
	pub form: FormConfig,
	/// Polling settings.
	pub poll: PollConfig,
	/// History settings.
	pub history: HistoryConfig,
	/// Bootstrap settings.
	pub bootstrap: BootstrapConfig,
	/// Scroll settings.
	pub scroll: ScrollConfig,
}

/// `[prefetch]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
	/// Cache lifetime used when a prefetch does not name one.
	pub default_cache_for: String,
	/// Hover delay before a hover-triggered prefetch fires.
	pub hover_delay_ms: u64,
}

impl Default for PrefetchConfig {
	fn default() -> Self {
		Self {
			default_cache_for: "30s".to_string(),
			hover_delay_ms: 75,
		}
	}
}

/// `[form]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
	/// How long `recently_successful` stays set after a successful submission.
	pub recently_successful_ms: u64,
}

impl Default for FormConfig {
	fn default() -> Self {
		Self {
			recently_successful_ms: 2000,
		}
	}
}

/// `[poll]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
	/// While the document is hidden, fire one tick in this many.
	pub hidden_throttle: u32,
}

impl Default for PollConfig {
	fn default() -> Self {
		Self {
			hidden_throttle: 10,
		}
	}
}

/// `[history]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
	/// Encrypt every history entry, not only pages that ask for it.
	pub encrypt: bool,
	/// Session storage key holding the history encryption key.
	pub key_storage_key: String,
	/// Session storage key holding the history encryption IV.
	pub iv_storage_key: String,
}

impl Default for HistoryConfig {
	fn default() -> Self {
		Self {
			encrypt: false,
			key_storage_key: "historyKey".to_string(),
			iv_storage_key: "historyIv".to_string(),
		}
	}
}

/// `[bootstrap]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
	/// Id of the element carrying the initial page payload.
	pub root_id: String,
}

impl Default for BootstrapConfig {
	fn default() -> Self {
		Self {
			root_id: "app".to_string(),
		}
	}
}

/// `[scroll]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
	/// Default for `preserve_scroll` when a visit does not say.
	pub preserve_default: bool,
}

impl ClientConfig {
	/// Loads configuration from a JSON document.
	pub fn from_json(source: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a TOML document.
	pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks values that deserialize but cannot be used.
	pub fn validate(&self) -> Result<(), ConfigError> {
		parse_duration(&self.prefetch.default_cache_for).map_err(|e| ConfigError::Invalid {
			key: "prefetch.default_cache_for",
			message: e.to_string(),
		})?;
		if self.poll.hidden_throttle == 0 {
			return Err(ConfigError::Invalid {
				key: "poll.hidden_throttle",
				message: "must be at least 1".to_string(),
			});
		}
		if self.bootstrap.root_id.is_empty() {
			return Err(ConfigError::Invalid {
				key: "bootstrap.root_id",
				message: "must not be empty".to_string(),
			});
		}
		Ok(())
	}
}
