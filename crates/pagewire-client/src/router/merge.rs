//! Reconciling an incoming page with the one on screen.

use std::collections::BTreeSet;

use pagewire_core::Page;
use pagewire_core::value::{deep_merge, shallow_merge};

use super::options::NavigationMeta;

/// Builds the page to commit from `incoming` and the `previous` page.
///
/// 1. `only` partial reloads of the same component keep every previous prop
///    and overwrite the ones the server sent.
/// 2. `except` partial reloads keep the previous value of the excluded props.
/// 3. `mergeProps` / `deepMergeProps` carried by the response are merged onto
///    the previous value, unless named in `reset`.
///
/// ```
/// use pagewire_client::router::{NavigationMeta, reconcile};
/// use pagewire_core::Page;
/// use serde_json::json;
///
/// let previous = Page::new("Feed", "/feed").with_prop("list", json!([1, 2]));
/// let mut incoming = Page::new("Feed", "/feed?page=2").with_prop("list", json!([3, 4]));
/// incoming.merge_props = vec!["list".into()];
///
/// let page = reconcile(&previous, incoming, &NavigationMeta::default());
/// assert_eq!(page.props["list"], json!([1, 2, 3, 4]));
/// ```
pub fn reconcile(previous: &Page, mut incoming: Page, meta: &NavigationMeta) -> Page {
	let carried: BTreeSet<String> = incoming.props.keys().cloned().collect();
	let same_component = previous.component == incoming.component;

	if same_component && !meta.only.is_empty() {
		let mut props = previous.props.clone();
		props.extend(std::mem::take(&mut incoming.props));
		incoming.props = props;
	}

	if same_component && !meta.except.is_empty() {
		for key in &meta.except {
			if let Some(value) = previous.props.get(key) {
				incoming.props.insert(key.clone(), value.clone());
			}
		}
	}

	let mergeable = |key: &String| carried.contains(key) && !meta.reset.contains(key);

	for key in incoming.merge_props.iter().filter(|key| mergeable(key)) {
		let Some(before) = previous.props.get(key) else {
			continue;
		};
		if let Some(next) = incoming.props.remove(key) {
			incoming.props.insert(key.clone(), shallow_merge(before, next));
		}
	}

	for key in incoming.deep_merge_props.iter().filter(|key| mergeable(key)) {
		let Some(before) = previous.props.get(key) else {
			continue;
		};
		if let Some(next) = incoming.props.remove(key) {
			incoming.props.insert(key.clone(), deep_merge(before, next));
		}
	}

	incoming
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn meta() -> NavigationMeta {
		NavigationMeta::default()
	}

	#[rstest]
	fn test_deep_merge_props() {
		let previous = Page::new("Settings", "/settings").with_prop("a", json!({"x": 1}));
		let mut incoming = Page::new("Settings", "/settings").with_prop("a", json!({"y": 2}));
		incoming.deep_merge_props = vec!["a".into()];

		let page = reconcile(&previous, incoming, &meta());

		assert_eq!(page.props["a"], json!({"x": 1, "y": 2}));
	}

	#[rstest]
	fn test_only_keeps_omitted_props() {
		let previous = Page::new("Users", "/users")
			.with_prop("users", json!(["ada"]))
			.with_prop("stats", json!({"count": 1}));
		let incoming = Page::new("Users", "/users").with_prop("stats", json!({"count": 2}));
		let meta = NavigationMeta {
			only: vec!["stats".into()],
			..meta()
		};

		let page = reconcile(&previous, incoming, &meta);

		assert_eq!(page.props["users"], json!(["ada"]));
		assert_eq!(page.props["stats"], json!({"count": 2}));
	}

	#[rstest]
	fn test_only_ignored_across_components() {
		let previous = Page::new("Users", "/users").with_prop("users", json!(["ada"]));
		let incoming = Page::new("Login", "/login").with_prop("stats", json!(1));
		let meta = NavigationMeta {
			only: vec!["stats".into()],
			..meta()
		};

		let page = reconcile(&previous, incoming, &meta);

		assert!(page.prop("users").is_none());
	}

	#[rstest]
	fn test_except_keeps_previous_values() {
		let previous = Page::new("Users", "/users").with_prop("heavy", json!([1, 2, 3]));
		let incoming = Page::new("Users", "/users").with_prop("light", json!(true));
		let meta = NavigationMeta {
			except: vec!["heavy".into()],
			..meta()
		};

		let page = reconcile(&previous, incoming, &meta);

		assert_eq!(page.props["heavy"], json!([1, 2, 3]));
		assert_eq!(page.props["light"], json!(true));
	}

	#[rstest]
	#[case(vec![], json!([1, 2, 3]))]
	#[case(vec!["list"], json!([3]))]
	fn test_reset_skips_merge(#[case] reset: Vec<&str>, #[case] expected: serde_json::Value) {
		let previous = Page::new("Feed", "/feed").with_prop("list", json!([1, 2]));
		let mut incoming = Page::new("Feed", "/feed").with_prop("list", json!([3]));
		incoming.merge_props = vec!["list".into()];
		let meta = NavigationMeta {
			reset: reset.into_iter().map(String::from).collect(),
			..meta()
		};

		assert_eq!(reconcile(&previous, incoming, &meta).props["list"], expected);
	}

	#[rstest]
	fn test_merge_prop_missing_before_uses_incoming() {
		let previous = Page::new("Feed", "/feed");
		let mut incoming = Page::new("Feed", "/feed").with_prop("list", json!([3]));
		incoming.merge_props = vec!["list".into()];

		assert_eq!(reconcile(&previous, incoming, &meta()).props["list"], json!([3]));
	}

	#[rstest]
	fn test_partial_reload_does_not_merge_uncarried_prop() {
		let previous = Page::new("Feed", "/feed")
			.with_prop("list", json!([1, 2]))
			.with_prop("count", json!(2));
		let mut incoming = Page::new("Feed", "/feed").with_prop("count", json!(3));
		incoming.merge_props = vec!["list".into()];
		let meta = NavigationMeta {
			only: vec!["count".into()],
			..meta()
		};

		assert_eq!(reconcile(&previous, incoming, &meta).props["list"], json!([1, 2]));
	}
}
