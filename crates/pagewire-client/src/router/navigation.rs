use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use pagewire_core::Page;
use serde_json::Value;

use super::merge::reconcile;
use super::options::NavigationMeta;
use super::{Router, RouterInner, headers};
use crate::error::ClientError;
use crate::history::HistoryCodec;
use crate::http::{Client, Extension, HttpRequest, HttpResponse, ResponseInterceptor, Teardown};

/// The navigation protocol, as a pipeline extension.
///
/// Requests carrying a [`NavigationMeta`] get the protocol headers. Their
/// responses are reconciled into the page store:
///
/// 1. `only` / `except` / merge props are applied ([`reconcile`])
/// 2. the history entry is pushed or replaced
/// 3. the store is updated
/// 4. if the previous page asked for it, remembered state and the history key
///    are cleared
/// 5. deferred prop groups are requested in the background
/// 6. the scroll position is reset unless preserved
///
/// A location header turns the response into a full page load. Error
/// responses that are not pages are shown in the error overlay; error
/// responses that are pages are committed like successes. Both still fail.
pub struct NavigationExtension {
	router: Weak<RouterInner>,
}

impl NavigationExtension {
	pub(crate) fn new(router: Weak<RouterInner>) -> Self {
		Self { router }
	}

	fn router(&self) -> Option<Router> {
		self.router.upgrade().map(Router::from_inner)
	}
}

impl Extension for NavigationExtension {
	fn install(&self, client: &Client) -> Teardown {
		let router = self.router.clone();
		let request_id = client.on_request(move |request| annotate(&router, request));
		let response_id = client.on_response(Rc::new(NavigationExtension::new(self.router.clone())));
		client.set_error_resolver(Rc::new(resolve_page_errors));

		let client = client.clone();
		Teardown::new(move || {
			client.eject(request_id);
			client.eject(response_id);
			client.clear_error_resolver();
		})
	}
}

fn annotate(router: &Weak<RouterInner>, request: &mut HttpRequest) -> Result<(), ClientError> {
	let Some(meta) = request.extensions.get::<NavigationMeta>().cloned() else {
		return Ok(());
	};
	let Some(router) = router.upgrade() else {
		return Ok(());
	};
	let (component, version) = router
		.store
		.with_untracked(|page| (page.component.clone(), page.version.clone()));

	request.insert_header(headers::PAGEWIRE, "true")?;
	if let Some(version) = version {
		request.insert_header(headers::VERSION, &version)?;
	}
	request.insert_header(headers::PARTIAL_COMPONENT, &component)?;
	if meta.is_partial() {
		if !meta.only.is_empty() {
			request.insert_header(headers::PARTIAL_DATA, &meta.only.join(","))?;
		}
		if !meta.except.is_empty() {
			request.insert_header(headers::PARTIAL_EXCEPT, &meta.except.join(","))?;
		}
	}
	if !meta.reset.is_empty() {
		request.insert_header(headers::RESET, &meta.reset.join(","))?;
	}
	if let Some(bag) = &meta.error_bag {
		request.insert_header(headers::ERROR_BAG, bag)?;
	}
	Ok(())
}

fn is_page_response(response: &HttpResponse) -> bool {
	response.header(headers::PAGEWIRE).is_some()
}

/// Field errors of a page response: `props.errors[bag]` with an error bag,
/// `props.errors` without. Array messages contribute their first entry.
fn resolve_page_errors(response: &HttpResponse, error_bag: Option<&str>) -> BTreeMap<String, String> {
	let Ok(body) = response.json::<Value>() else {
		return BTreeMap::new();
	};
	let errors = &body["props"]["errors"];
	let errors = match error_bag {
		Some(bag) => &errors[bag],
		None => errors,
	};
	errors
		.as_object()
		.map(|fields| {
			fields
				.iter()
				.filter_map(|(field, message)| error_message(message).map(|message| (field.clone(), message)))
				.collect()
		})
		.unwrap_or_default()
}

fn error_message(value: &Value) -> Option<String> {
	match value {
		Value::Null => None,
		Value::String(message) => Some(message.clone()),
		Value::Array(messages) => messages.first().and_then(error_message),
		other => Some(other.to_string()),
	}
}

impl Router {
	fn commit(&self, response: &HttpResponse, meta: &NavigationMeta) -> Result<Page, ClientError> {
		let incoming = Page::from_value(response.json()?).map_err(|e| ClientError::InvalidBody(e.to_string()))?;
		let previous = self.page();
		let mut page = reconcile(&previous, incoming, meta);
		if meta.preserve_url {
			page.url = previous.url.clone();
		}

		let session = self.session();
		let history = session.history();
		let replace = HistoryCodec::should_replace(meta.replace, meta.preserve_history, &previous.url, &page.url);
		if let Err(error) = history.push_or_replace(&page, replace) {
			tracing::warn!(%error, url = %page.url, "failed to write history entry");
		}
		tracing::debug!(component = %page.component, url = %page.url, replace, "committing page");
		self.store().set(page.clone());

		if previous.clear_history {
			session.remember().clear();
			history.clear();
			if let Err(error) = history.push_or_replace(&page, true) {
				tracing::warn!(%error, url = %page.url, "failed to rewrite history entry after clearing");
			}
		}

		if !meta.is_partial() && !page.deferred_props.is_empty() {
			self.load_deferred_props();
		}

		if !meta.preserve_scroll {
			session.browser().scroll_to_top();
		}
		Ok(page)
	}

	fn redirect(&self, location: &str) {
		tracing::debug!(location, "server requested a full page load");
		self.session().browser().hard_visit(location);
	}
}

#[async_trait(?Send)]
impl ResponseInterceptor for NavigationExtension {
	async fn on_response(&self, response: HttpResponse) -> Result<HttpResponse, ClientError> {
		if response.config.prefetch {
			return Ok(response);
		}
		let Some(meta) = response.config.extensions.get::<NavigationMeta>().cloned() else {
			return Ok(response);
		};
		let Some(router) = self.router() else {
			return Ok(response);
		};

		if let Some(location) = response.header(headers::LOCATION) {
			router.redirect(location);
			return Ok(response);
		}
		if !is_page_response(&response) {
			router.session().browser().show_error_page(&response.text());
			return Err(ClientError::Rejected(format!(
				"{} did not answer with a page",
				response.config.url
			)));
		}

		router.commit(&response, &meta)?;
		Ok(response)
	}

	async fn on_error(&self, error: ClientError) -> Result<HttpResponse, ClientError> {
		let response = match error {
			ClientError::Status(response) => response,
			other => return Err(other),
		};
		if response.config.prefetch {
			return Err(ClientError::Status(response));
		}
		let Some(meta) = response.config.extensions.get::<NavigationMeta>().cloned() else {
			return Err(ClientError::Status(response));
		};
		let Some(router) = self.router() else {
			return Err(ClientError::Status(response));
		};

		if let Some(location) = response.header(headers::LOCATION) {
			router.redirect(location);
			return Ok(*response);
		}
		if is_page_response(&response) {
			router.commit(&response, &meta)?;
		} else {
			tracing::debug!(status = %response.status, url = %response.config.url, "showing error response");
			router.session().browser().show_error_page(&response.text());
		}
		Err(ClientError::Status(response))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ::http::{HeaderMap, StatusCode};
	use rstest::rstest;
	use serde_json::json;

	fn response(body: Value) -> HttpResponse {
		HttpResponse::new(StatusCode::UNPROCESSABLE_ENTITY, HeaderMap::new(), body.to_string())
	}

	#[rstest]
	fn test_resolve_page_errors() {
		let response = response(json!({
			"props": {"errors": {"email": "taken", "name": ["required", "short"], "login": {"password": "wrong"}}}
		}));

		let errors = resolve_page_errors(&response, None);
		assert_eq!(errors["email"], "taken");
		assert_eq!(errors["name"], "required");

		let bagged = resolve_page_errors(&response, Some("login"));
		assert_eq!(bagged, BTreeMap::from([("password".to_string(), "wrong".to_string())]));
		assert!(resolve_page_errors(&response, Some("missing")).is_empty());
	}

	#[rstest]
	fn test_non_json_body_has_no_errors() {
		let response = HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), "<h1>boom</h1>");
		assert!(resolve_page_errors(&response, None).is_empty());
	}
}
