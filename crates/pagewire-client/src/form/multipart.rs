use pagewire_core::FileBlob;
use serde_json::Value;

use crate::http::{MultipartForm, Part};

/// Flattens `value` into bracketed multipart fields.
///
/// Nested objects become `a[b][c]`, arrays `a[0]`; booleans become `"true"` /
/// `"false"`, numbers their decimal form and `null` an empty string. Files are
/// kept as file parts. Empty arrays and objects produce no field.
///
/// ```
/// use pagewire_client::form::to_multipart;
/// use pagewire_core::FileBlob;
/// use serde_json::json;
///
/// let form = to_multipart(&json!({
///     "files": [FileBlob::new("a.txt", "text/plain", b"a".to_vec()).to_value()],
///     "meta": {"name": "report", "public": true},
/// }));
/// let names: Vec<&str> = form.parts().iter().map(|(name, _)| name.as_str()).collect();
/// assert_eq!(names, ["files[0]", "meta[name]", "meta[public]"]);
/// assert_eq!(form.get_text("meta[public]"), Some("true"));
/// ```
pub fn to_multipart(value: &Value) -> MultipartForm {
	let mut form = MultipartForm::new();
	for (name, part) in flatten(value) {
		form.push(name, part);
	}
	form
}

/// Encodes `value` as a query string with the same bracketed keys.
///
/// Files cannot travel in a query string and are skipped.
pub fn to_query(value: &Value) -> Result<String, serde_urlencoded::ser::Error> {
	let pairs: Vec<(String, String)> = flatten(value)
		.into_iter()
		.filter_map(|(name, part)| match part {
			Part::Text(text) => Some((name, text)),
			Part::File(_) => None,
		})
		.collect();
	serde_urlencoded::to_string(pairs)
}

fn flatten(value: &Value) -> Vec<(String, Part)> {
	let mut fields = Vec::new();
	match value {
		Value::Object(map) if FileBlob::from_value(value).is_none() => {
			for (key, value) in map {
				append(&mut fields, key.clone(), value);
			}
		}
		other => append(&mut fields, String::new(), other),
	}
	fields
}

fn append(fields: &mut Vec<(String, Part)>, name: String, value: &Value) {
	if let Some(file) = FileBlob::from_value(value) {
		fields.push((name, Part::File(file)));
		return;
	}
	match value {
		Value::Object(map) => {
			for (key, value) in map {
				append(fields, format!("{name}[{key}]"), value);
			}
		}
		Value::Array(items) => {
			for (index, value) in items.iter().enumerate() {
				append(fields, format!("{name}[{index}]"), value);
			}
		}
		Value::Bool(flag) => fields.push((name, Part::Text(flag.to_string()))),
		Value::Number(number) => fields.push((name, Part::Text(number.to_string()))),
		Value::String(text) => fields.push((name, Part::Text(text.clone()))),
		Value::Null => fields.push((name, Part::Text(String::new()))),
	}
}
