//! The page descriptor exchanged with the server.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors produced while reading a page payload.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
	/// The payload is not valid JSON or does not have the page shape.
	#[error("invalid page payload: {0}")]
	Json(#[from] serde_json::Error),
	/// `component` was empty.
	#[error("page payload has no component")]
	MissingComponent,
	/// `url` was empty.
	#[error("page payload has no url")]
	MissingUrl,
}

/// Saved scroll offset of one scroll region.
///
/// History entries keep one of these per scroll region of the page so that
/// back/forward navigation can restore them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
	/// Vertical offset in pixels.
	pub top: f64,
	/// Horizontal offset in pixels.
	pub left: f64,
}

/// A server-rendered page: which component to show and with which props.
///
/// Field names follow the camelCase wire format:
///
/// ```
/// use pagewire_core::Page;
///
/// let page = Page::from_json(r#"{
///     "component": "Users/Index",
///     "props": {"users": []},
///     "url": "/users",
///     "version": "abc",
///     "mergeProps": ["users"]
/// }"#).unwrap();
///
/// assert_eq!(page.component, "Users/Index");
/// assert_eq!(page.merge_props, vec!["users".to_string()]);
/// assert!(!page.encrypt_history);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
	/// Identifier of the UI component to render.
	pub component: String,
	/// Server-sent data for the component.
	#[serde(default)]
	pub props: Map<String, Value>,
	/// URL this page lives at.
	pub url: String,
	/// Asset version, used by the server to detect stale clients.
	#[serde(default)]
	pub version: Option<String>,
	/// Forget remembered state and history encryption keys after this page.
	#[serde(default, skip_serializing_if = "is_false")]
	pub clear_history: bool,
	/// Store this page's history entries encrypted.
	#[serde(default, skip_serializing_if = "is_false")]
	pub encrypt_history: bool,
	/// Prop groups loaded by follow-up requests after the page is shown.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub deferred_props: BTreeMap<String, Vec<String>>,
	/// Props appended to (arrays) or shallow-merged onto (objects) the previous value.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub merge_props: Vec<String>,
	/// Props recursively merged onto the previous value.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub deep_merge_props: Vec<String>,
}

fn is_false(value: &bool) -> bool {
	!*value
}

impl Page {
	/// Creates a page with the given component and url and no props.
	pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			component: component.into(),
			url: url.into(),
			..Self::default()
		}
	}

	/// Builder-style prop setter.
	pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
		self.props.insert(key.into(), value);
		self
	}

	/// Parses and validates a page payload.
	pub fn from_json(json: &str) -> Result<Self, PageError> {
		let page: Self = serde_json::from_str(json)?;
		page.validate()?;
		Ok(page)
	}

	/// Converts and validates an already-parsed payload.
	pub fn from_value(value: Value) -> Result<Self, PageError> {
		let page: Self = serde_json::from_value(value)?;
		page.validate()?;
		Ok(page)
	}

	/// Checks that `component` and `url` are present.
	pub fn validate(&self) -> Result<(), PageError> {
		if self.component.is_empty() {
			return Err(PageError::MissingComponent);
		}
		if self.url.is_empty() {
			return Err(PageError::MissingUrl);
		}
		Ok(())
	}

	/// Serializes the page to its wire format.
	pub fn to_json(&self) -> Result<String, PageError> {
		Ok(serde_json::to_string(self)?)
	}

	/// Looks up a prop.
	pub fn prop(&self, key: &str) -> Option<&Value> {
		self.props.get(key)
	}
}
