//! Visits through the full pipeline: headers, reconciliation, history and
//! error handling.

mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use common::{harness, settle};
use pagewire_client::error::ClientError;
use pagewire_client::platform::Browser;
use pagewire_client::router::headers;
use pagewire_client::router::{RouterError, VisitOptions, VisitOutcome};
use pagewire_client::testing::MockResponse;
use pagewire_core::Page;
use serde_json::json;
use serial_test::serial;
use tokio::task::LocalSet;

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_visit_commits_page_and_pushes_history() {
	let h = harness(Page::new("Home", "/"));
	h.transport.respond(
		"/users",
		MockResponse::page(&Page::new("Users", "/users").with_prop("users", json!(["ada"]))),
	);

	let outcome = h.router.visit("/users", VisitOptions::new()).await.unwrap();

	assert!(matches!(outcome, VisitOutcome::Completed { .. }));
	let page = h.router.page();
	assert_eq!(page.component, "Users");
	assert_eq!(page.props["users"], json!(["ada"]));
	assert_eq!(h.browser.history_len(), 2);
	assert_eq!(h.browser.location(), "/users");
	assert_eq!(h.browser.scroll_resets(), 1);

	let calls = h.transport.calls_to("/users");
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].header(headers::PAGEWIRE), Some("true"));
	assert_eq!(calls[0].header(headers::PARTIAL_DATA), None);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_plain_visit_sends_current_component_and_version() {
	let mut initial = Page::new("Home", "/");
	initial.version = Some("v7".to_string());
	let h = harness(initial);
	h.transport.respond("/users", MockResponse::page(&Page::new("Users", "/users")));

	h.router.visit("/users", VisitOptions::new()).await.unwrap();

	let call = &h.transport.calls_to("/users")[0];
	assert_eq!(call.header(headers::PARTIAL_COMPONENT), Some("Home"));
	assert_eq!(call.header(headers::VERSION), Some("v7"));
	assert_eq!(call.header(headers::PARTIAL_EXCEPT), None);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_partial_reload_merges_props() {
	let initial = Page::new("Feed", "/feed")
		.with_prop("posts", json!([1, 2]))
		.with_prop("user", json!("ada"));
	let h = harness(initial);
	let mut response = Page::new("Feed", "/feed").with_prop("posts", json!([3]));
	response.merge_props = vec!["posts".to_string()];
	h.transport.respond("/feed", MockResponse::page(&response));

	h.router.reload(VisitOptions::new().only(["posts"])).await.unwrap();

	let call = &h.transport.calls_to("/feed")[0];
	assert_eq!(call.header(headers::PARTIAL_COMPONENT), Some("Feed"));
	assert_eq!(call.header(headers::PARTIAL_DATA), Some("posts"));

	let page = h.router.page();
	assert_eq!(page.props["posts"], json!([1, 2, 3]));
	assert_eq!(page.props["user"], json!("ada"));
	// same URL: the entry is replaced and the scroll position kept
	assert_eq!(h.browser.history_len(), 1);
	assert_eq!(h.browser.scroll_resets(), 0);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_reset_skips_merge() {
	let h = harness(Page::new("Feed", "/feed").with_prop("posts", json!([1, 2])));
	let mut response = Page::new("Feed", "/feed").with_prop("posts", json!([9]));
	response.merge_props = vec!["posts".to_string()];
	h.transport.respond("/feed", MockResponse::page(&response));

	h.router
		.reload(VisitOptions::new().only(["posts"]).reset(["posts"]))
		.await
		.unwrap();

	assert_eq!(h.router.page().props["posts"], json!([9]));
	assert_eq!(h.transport.calls()[0].header(headers::RESET), Some("posts"));
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_location_conflict_triggers_hard_visit() {
	let h = harness(Page::new("Home", "/"));
	h.transport.respond("/old", MockResponse::location("https://example.com/new"));

	let outcome = h.router.visit("/old", VisitOptions::new()).await.unwrap();

	assert!(matches!(outcome, VisitOutcome::Redirected(ref url) if url == "https://example.com/new"));
	assert_eq!(h.browser.hard_visits(), vec!["https://example.com/new".to_string()]);
	assert_eq!(h.router.page().component, "Home");
	assert_eq!(h.browser.history_len(), 1);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_non_page_error_is_shown_in_overlay() {
	let h = harness(Page::new("Home", "/"));
	h.transport.respond("/boom", MockResponse::text(500, "<h1>boom</h1>"));

	let error = h.router.visit("/boom", VisitOptions::new()).await.unwrap_err();

	assert_eq!(error.response().map(|r| r.status.as_u16()), Some(500));
	assert_eq!(h.browser.error_pages(), vec!["<h1>boom</h1>".to_string()]);
	assert_eq!(h.router.page().component, "Home");
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_plain_success_response_is_rejected() {
	let h = harness(Page::new("Home", "/"));
	h.transport.respond("/plain", MockResponse::text(200, "<p>plain</p>"));

	let error = h.router.visit("/plain", VisitOptions::new()).await.unwrap_err();

	assert!(matches!(error, RouterError::Client(ClientError::Rejected(_))));
	assert_eq!(h.browser.error_pages(), vec!["<p>plain</p>".to_string()]);
	assert_eq!(h.browser.history_len(), 1);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_error_status_page_is_committed() {
	let h = harness(Page::new("Signup", "/signup"));
	let page = Page::new("Signup", "/signup").with_prop("errors", json!({"email": "taken"}));
	h.transport.respond("/signup", MockResponse::page_with_status(422, &page));

	let error = h
		.router
		.post("/signup", json!({"email": "a@b.c"}), VisitOptions::new())
		.await
		.unwrap_err();

	assert_eq!(error.response().map(|r| r.status.as_u16()), Some(422));
	assert_eq!(h.router.page().props["errors"], json!({"email": "taken"}));
	assert!(h.browser.error_pages().is_empty());
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_on_before_cancels_visit() {
	let h = harness(Page::new("Home", "/"));

	let outcome = h
		.router
		.visit("/users", VisitOptions::new().on_before(|_| false))
		.await
		.unwrap();

	assert!(matches!(outcome, VisitOutcome::Cancelled));
	assert!(h.transport.calls().is_empty());
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_lifecycle_callbacks_run_in_order() {
	let h = harness(Page::new("Home", "/"));
	h.transport.respond("/users", MockResponse::page(&Page::new("Users", "/users")));
	let log = Rc::new(RefCell::new(Vec::new()));

	let options = VisitOptions::new()
		.on_start({
			let log = log.clone();
			move |_| log.borrow_mut().push("start".to_string())
		})
		.on_success({
			let log = log.clone();
			move |page| log.borrow_mut().push(format!("success:{}", page.component))
		})
		.on_error({
			let log = log.clone();
			move |_| log.borrow_mut().push("error".to_string())
		})
		.on_finish({
			let log = log.clone();
			move || log.borrow_mut().push("finish".to_string())
		});
	h.router.visit("/users", options).await.unwrap();

	assert_eq!(*log.borrow(), vec!["start", "success:Users", "finish"]);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_preserve_url_keeps_current_url() {
	let h = harness(Page::new("Feed", "/feed"));
	h.transport.respond(
		"/feed",
		MockResponse::page(&Page::new("Feed", "/feed?page=2").with_prop("page", json!(2))),
	);

	h.router
		.visit("/feed?page=2", VisitOptions::new().preserve_url(true))
		.await
		.unwrap();

	let page = h.router.page();
	assert_eq!(page.url, "/feed");
	assert_eq!(page.props["page"], json!(2));
	assert_eq!(h.browser.history_len(), 1);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_deferred_props_are_requested_after_visit() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Home", "/"));
			let mut dashboard = Page::new("Dashboard", "/dashboard").with_prop("user", json!("ada"));
			dashboard.deferred_props = BTreeMap::from([("default".to_string(), vec!["stats".to_string()])]);
			h.transport.respond("/dashboard", MockResponse::page(&dashboard));
			h.transport.then_respond(
				"/dashboard",
				MockResponse::page(&Page::new("Dashboard", "/dashboard").with_prop("stats", json!(42))),
			);

			h.router.visit("/dashboard", VisitOptions::new()).await.unwrap();
			settle().await;

			let calls = h.transport.calls_to("/dashboard");
			assert_eq!(calls.len(), 2);
			assert_eq!(calls[1].header(headers::PARTIAL_DATA), Some("stats"));
			let page = h.router.page();
			assert_eq!(page.props["stats"], json!(42));
			assert_eq!(page.props["user"], json!("ada"));
			assert_eq!(h.browser.history_len(), 2);
		})
		.await;
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_clear_history_forgets_remembered_state() {
	let mut logout = Page::new("Account", "/account");
	logout.clear_history = true;
	let h = harness(logout);
	h.router.remember("draft", json!({"body": "secret"}));
	h.transport.respond("/login", MockResponse::page(&Page::new("Login", "/login")));

	h.router.visit("/login", VisitOptions::new()).await.unwrap();

	assert_eq!(h.router.restore("draft"), None);
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_detached_router_sends_plain_requests() {
	let h = harness(Page::new("Home", "/"));
	h.transport.respond("/users", MockResponse::page(&Page::new("Users", "/users")));
	h.router.detach();

	h.router.visit("/users", VisitOptions::new()).await.unwrap();

	assert_eq!(h.transport.calls()[0].header(headers::PAGEWIRE), None);
	assert_eq!(h.router.page().component, "Home");
}
