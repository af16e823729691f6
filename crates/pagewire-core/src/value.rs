//! Semantic values.
//!
//! Props, form fields and remembered state are all carried as
//! `serde_json::Value`. This module holds the two operations the runtime needs
//! over that representation: depth-bounded structural equality and the
//! append/merge rules used when reconciling server responses.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::page::Page;

/// Maximum nesting depth compared by [`deep_equal`].
///
/// Values nested deeper than this are reported as different, which at worst
/// causes one redundant notification.
pub const MAX_COMPARE_DEPTH: usize = 64;

/// Structural equality over JSON values.
///
/// Object key order is ignored and numbers compare by value (`1` equals `1.0`).
///
/// ```
/// use pagewire_core::value::deep_equal;
/// use serde_json::json;
///
/// assert!(deep_equal(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1.0, {"b": 2}]})));
/// assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": null})));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
	deep_equal_bounded(a, b, MAX_COMPARE_DEPTH)
}

/// [`deep_equal`] with an explicit depth budget.
pub fn deep_equal_bounded(a: &Value, b: &Value, depth: usize) -> bool {
	match (a, b) {
		(Value::Null, Value::Null) => true,
		(Value::Bool(x), Value::Bool(y)) => x == y,
		(Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
		(Value::String(x), Value::String(y)) => x == y,
		(Value::Array(x), Value::Array(y)) => {
			if depth == 0 {
				return false;
			}
			x.len() == y.len()
				&& x.iter()
					.zip(y)
					.all(|(x, y)| deep_equal_bounded(x, y, depth - 1))
		}
		(Value::Object(x), Value::Object(y)) => {
			if depth == 0 {
				return false;
			}
			maps_equal_bounded(x, y, depth - 1)
		}
		_ => false,
	}
}

/// Integers compare exactly; floats only when either side is one.
fn numbers_equal(x: &Number, y: &Number) -> bool {
	if x.is_f64() || y.is_f64() {
		return matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y);
	}
	integer(x) == integer(y)
}

fn integer(n: &Number) -> Option<i128> {
	n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

/// Structural equality over JSON objects.
pub fn maps_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
	maps_equal_bounded(a, b, MAX_COMPARE_DEPTH)
}

fn maps_equal_bounded(a: &Map<String, Value>, b: &Map<String, Value>, depth: usize) -> bool {
	a.len() == b.len()
		&& a.iter().all(|(key, x)| {
			b.get(key)
				.is_some_and(|y| deep_equal_bounded(x, y, depth))
		})
}

/// Semantic equality of two pages.
///
/// Props are compared with [`maps_equal`]; every other field must match exactly.
pub fn pages_equal(a: &Page, b: &Page) -> bool {
	a.component == b.component
		&& a.url == b.url
		&& a.version == b.version
		&& a.clear_history == b.clear_history
		&& a.encrypt_history == b.encrypt_history
		&& a.deferred_props == b.deferred_props
		&& a.merge_props == b.merge_props
		&& a.deep_merge_props == b.deep_merge_props
		&& maps_equal(&a.props, &b.props)
}

/// Append or shallow-merge `incoming` onto `previous`.
///
/// Arrays are concatenated, objects are merged one level deep (incoming keys win),
/// anything else resolves to `incoming`.
///
/// ```
/// use pagewire_core::value::shallow_merge;
/// use serde_json::json;
///
/// assert_eq!(shallow_merge(&json!([1, 2]), json!([3, 4])), json!([1, 2, 3, 4]));
/// assert_eq!(
///     shallow_merge(&json!({"a": {"x": 1}}), json!({"a": {"y": 2}})),
///     json!({"a": {"y": 2}})
/// );
/// ```
pub fn shallow_merge(previous: &Value, incoming: Value) -> Value {
	match (previous, incoming) {
		(Value::Array(prev), Value::Array(next)) => {
			let mut merged = prev.clone();
			merged.extend(next);
			Value::Array(merged)
		}
		(Value::Object(prev), Value::Object(next)) => {
			let mut merged = prev.clone();
			merged.extend(next);
			Value::Object(merged)
		}
		(_, incoming) => incoming,
	}
}

/// Recursively merge `incoming` onto `previous`.
///
/// Objects merge key by key, arrays are concatenated, scalars take `incoming`.
///
/// ```
/// use pagewire_core::value::deep_merge;
/// use serde_json::json;
///
/// assert_eq!(
///     deep_merge(&json!({"a": {"x": 1}}), json!({"a": {"y": 2}})),
///     json!({"a": {"x": 1, "y": 2}})
/// );
/// ```
pub fn deep_merge(previous: &Value, incoming: Value) -> Value {
	match (previous, incoming) {
		(Value::Array(prev), Value::Array(next)) => {
			let mut merged = prev.clone();
			merged.extend(next);
			Value::Array(merged)
		}
		(Value::Object(prev), Value::Object(next)) => {
			let mut merged = prev.clone();
			for (key, value) in next {
				let combined = match merged.get(&key) {
					Some(existing) => deep_merge(existing, value),
					None => value,
				};
				merged.insert(key, combined);
			}
			Value::Object(merged)
		}
		(_, incoming) => incoming,
	}
}

/// Key marking a serialized [`FileBlob`] inside a JSON value.
pub const FILE_MARKER: &str = "$file";

/// A file-like value carried inside form data.
///
/// Serializes to `{"$file": {"name": ..., "type": ..., "data": <base64>}}` so it can
/// live inside a `serde_json::Value` next to ordinary fields and be recognised
/// again by [`has_files`] and multipart encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
	/// File name sent with the multipart part.
	pub name: String,
	/// MIME type, e.g. `image/png`.
	pub content_type: String,
	/// Raw contents.
	pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct FilePayload {
	name: String,
	#[serde(rename = "type")]
	content_type: String,
	data: String,
}

impl FileBlob {
	/// Creates a blob.
	pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
		Self {
			name: name.into(),
			content_type: content_type.into(),
			data: data.into(),
		}
	}

	/// Encodes the blob as a marker value.
	///
	/// ```
	/// use pagewire_core::value::{FileBlob, has_files};
	/// use serde_json::json;
	///
	/// let avatar = FileBlob::new("a.png", "image/png", vec![1, 2, 3]).to_value();
	/// assert!(has_files(&json!({"user": {"avatar": avatar}})));
	/// ```
	pub fn to_value(&self) -> Value {
		let payload = FilePayload {
			name: self.name.clone(),
			content_type: self.content_type.clone(),
			data: STANDARD.encode(&self.data),
		};
		let mut marker = Map::new();
		marker.insert(
			FILE_MARKER.to_string(),
			serde_json::to_value(payload).unwrap_or(Value::Null),
		);
		Value::Object(marker)
	}

	/// Decodes a marker value produced by [`FileBlob::to_value`].
	///
	/// Returns `None` for anything that is not a well-formed file marker.
	pub fn from_value(value: &Value) -> Option<Self> {
		let object = value.as_object()?;
		if object.len() != 1 {
			return None;
		}
		let payload: FilePayload = serde_json::from_value(object.get(FILE_MARKER)?.clone()).ok()?;
		let data = STANDARD.decode(payload.data).ok()?;
		Some(Self {
			name: payload.name,
			content_type: payload.content_type,
			data,
		})
	}
}

impl From<FileBlob> for Value {
	fn from(blob: FileBlob) -> Self {
		blob.to_value()
	}
}

/// Whether `value` contains a [`FileBlob`] at any depth.
pub fn has_files(value: &Value) -> bool {
	match value {
		Value::Object(map) => {
			FileBlob::from_value(value).is_some() || map.values().any(has_files)
		}
		Value::Array(items) => items.iter().any(has_files),
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(json!(null), json!(null), true)]
	#[case(json!(1), json!(1.0), true)]
	#[case(json!("a"), json!("a"), true)]
	#[case(json!([1, 2]), json!([2, 1]), false)]
	#[case(json!({"a": 1, "b": 2}), json!({"b": 2, "a": 1}), true)]
	#[case(json!({"a": {"b": [true]}}), json!({"a": {"b": [false]}}), false)]
	#[case(json!(0), json!(false), false)]
	#[case(json!(9007199254740993_u64), json!(9007199254740992_u64), false)]
	#[case(json!(-9007199254740993_i64), json!(-9007199254740992_i64), false)]
	#[case(json!(u64::MAX), json!(u64::MAX), true)]
	#[case(json!(-1), json!(-1.0), true)]
	fn test_deep_equal(#[case] a: Value, #[case] b: Value, #[case] expected: bool) {
		assert_eq!(deep_equal(&a, &b), expected);
	}

	#[rstest]
	fn test_depth_budget_exhausted_reports_unequal() {
		let nested = json!({"a": {"b": {"c": 1}}});
		assert!(deep_equal_bounded(&nested, &nested, 3));
		assert!(!deep_equal_bounded(&nested, &nested, 2));
	}

	#[rstest]
	fn test_pages_equal_ignores_number_representation() {
		let a = Page::new("Home", "/").with_prop("n", json!(1));
		let b = Page::new("Home", "/").with_prop("n", json!(1.0));
		let c = Page::new("Home", "/other").with_prop("n", json!(1));

		assert!(pages_equal(&a, &b));
		assert!(!pages_equal(&a, &c));
	}

	#[rstest]
	fn test_pages_equal_distinguishes_large_ids() {
		let a = Page::new("Users/Show", "/users/1").with_prop("id", json!(9007199254740993_u64));
		let b = Page::new("Users/Show", "/users/1").with_prop("id", json!(9007199254740992_u64));

		assert!(!pages_equal(&a, &b));
	}

	#[rstest]
	fn test_shallow_merge_scalar_takes_incoming() {
		assert_eq!(shallow_merge(&json!(1), json!("x")), json!("x"));
		assert_eq!(shallow_merge(&json!([1]), json!({"a": 1})), json!({"a": 1}));
	}

	#[rstest]
	fn test_file_blob_marker_round_trip() {
		let blob = FileBlob::new("notes.txt", "text/plain", b"hello".to_vec());
		let value = blob.to_value();

		assert_eq!(value["$file"]["data"], json!("aGVsbG8="));
		assert_eq!(FileBlob::from_value(&value), Some(blob));
	}

	#[rstest]
	#[case(json!({"name": "x", "tags": ["a"]}), false)]
	#[case(json!({"files": [FileBlob::new("a", "b", vec![]).to_value()]}), true)]
	#[case(json!({"$file": "not a blob"}), false)]
	fn test_has_files(#[case] value: Value, #[case] expected: bool) {
		assert_eq!(has_files(&value), expected);
	}

	#[rstest]
	fn test_deep_merge_concatenates_nested_arrays() {
		let merged = deep_merge(
			&json!({"feed": {"items": [1], "page": 1}}),
			json!({"feed": {"items": [2], "page": 2}}),
		);
		assert_eq!(merged, json!({"feed": {"items": [1, 2], "page": 2}}));
	}
}
