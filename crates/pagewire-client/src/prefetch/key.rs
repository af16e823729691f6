use http::Method;
use sha2::{Digest, Sha256};

use super::PrefetchError;
use crate::http::{Part, RequestBody};

/// Stable cache key for a request: SHA-256 over method, URL (without fragment)
/// and serialized body, hex encoded.
///
/// ```
/// use pagewire_client::http::RequestBody;
/// use pagewire_client::prefetch::cache_key;
/// use http::Method;
///
/// let a = cache_key(&Method::GET, "/users?page=2", &RequestBody::Empty).unwrap();
/// let b = cache_key(&Method::GET, "/users?page=2#top", &RequestBody::Empty).unwrap();
/// let c = cache_key(&Method::GET, "/users?page=3", &RequestBody::Empty).unwrap();
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
pub fn cache_key(method: &Method, url: &str, body: &RequestBody) -> Result<String, PrefetchError> {
	let mut hasher = Sha256::new();
	hasher.update(method.as_str().as_bytes());
	hasher.update([0]);
	hasher.update(normalize_url(url).as_bytes());
	hasher.update([0]);
	match body {
		RequestBody::Empty => {}
		RequestBody::Json(value) => {
			let bytes = serde_json::to_vec(value).map_err(|e| PrefetchError::Key(e.to_string()))?;
			hasher.update(&bytes);
		}
		RequestBody::Multipart(form) => {
			for (name, part) in form.parts() {
				hasher.update(name.as_bytes());
				hasher.update([0]);
				match part {
					Part::Text(text) => hasher.update(text.as_bytes()),
					Part::File(file) => {
						hasher.update(file.name.as_bytes());
						hasher.update(file.content_type.as_bytes());
						hasher.update(&file.data);
					}
				}
				hasher.update([0]);
			}
		}
	}
	Ok(hex::encode(hasher.finalize()))
}

fn normalize_url(url: &str) -> &str {
	url.split_once('#').map_or(url, |(before, _)| before)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_method_and_body_change_key() {
		let get = cache_key(&Method::GET, "/search", &RequestBody::Empty).unwrap();
		let post = cache_key(&Method::POST, "/search", &RequestBody::Empty).unwrap();
		let post_body =
			cache_key(&Method::POST, "/search", &RequestBody::Json(json!({"q": "rust"}))).unwrap();

		assert_ne!(get, post);
		assert_ne!(post, post_body);
		assert_eq!(get.len(), 64);
	}
}
