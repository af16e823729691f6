//! Polling, load-when-visible and hover prefetch, on a paused clock.

mod common;

use std::time::Duration;

use common::{harness, settle};
use pagewire_client::router::{VisitOptions, headers};
use pagewire_client::testing::MockResponse;
use pagewire_client::triggers::MIN_POLL_INTERVAL;
use pagewire_core::Page;
use serde_json::json;
use serial_test::serial;
use tokio::task::LocalSet;
use tokio::time::sleep;

fn feed() -> MockResponse {
	MockResponse::page(&Page::new("Feed", "/feed").with_prop("comments", json!(["first"])))
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_poll_reloads_every_interval_until_stopped() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed"));
			h.transport.respond("/feed", feed());
			let poll = h.router.poll(Duration::from_secs(1), VisitOptions::new(), false);
			poll.start();
			assert!(poll.is_running());

			sleep(Duration::from_millis(3500)).await;
			assert_eq!(h.transport.calls_to("/feed").len(), 3);

			poll.stop();
			assert!(!poll.is_running());
			sleep(Duration::from_secs(3)).await;
			assert_eq!(h.transport.calls_to("/feed").len(), 3);
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_zero_interval_is_clamped() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed"));
			h.transport.respond("/feed", feed());
			let poll = h.router.poll(Duration::ZERO, VisitOptions::new(), false);
			assert_eq!(poll.interval(), MIN_POLL_INTERVAL);
			poll.start();

			sleep(MIN_POLL_INTERVAL * 5 + MIN_POLL_INTERVAL / 2).await;
			assert_eq!(h.transport.calls_to("/feed").len(), 5);
			poll.stop();
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_poll_is_throttled_while_hidden() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed"));
			h.transport.respond("/feed", feed());
			h.browser.set_hidden(true);
			let poll = h.router.poll(Duration::from_secs(1), VisitOptions::new(), false);
			poll.start();

			sleep(Duration::from_millis(25_500)).await;
			// one tick in ten fires while hidden
			assert_eq!(h.transport.calls_to("/feed").len(), 2);
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_keep_alive_poll_ignores_visibility() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed"));
			h.transport.respond("/feed", feed());
			h.browser.set_hidden(true);
			let poll = h.router.poll(Duration::from_secs(1), VisitOptions::new(), true);
			poll.start();

			sleep(Duration::from_millis(5500)).await;
			assert_eq!(h.transport.calls_to("/feed").len(), 5);
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_dropping_poll_stops_it() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed"));
			h.transport.respond("/feed", feed());
			let poll = h.router.poll(Duration::from_secs(1), VisitOptions::new(), false);
			poll.start();
			sleep(Duration::from_millis(1500)).await;
			drop(poll);

			sleep(Duration::from_secs(5)).await;
			assert_eq!(h.transport.calls_to("/feed").len(), 1);
		})
		.await;
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_when_visible_loads_once() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed").with_prop("title", json!("news")));
			h.transport.respond("/feed", feed());
			let loader = h.router.when_visible(["comments"]);
			assert_eq!(loader.root_margin(), "0px");

			assert!(!loader.handle_intersection(false));
			assert!(loader.handle_intersection(true));
			assert!(!loader.handle_intersection(true), "ignored while fetching");
			settle().await;

			assert!(!loader.is_connected());
			assert!(!loader.handle_intersection(true));
			let calls = h.transport.calls_to("/feed");
			assert_eq!(calls.len(), 1);
			assert_eq!(calls[0].header(headers::PARTIAL_DATA), Some("comments"));
			let page = h.router.page();
			assert_eq!(page.props["comments"], json!(["first"]));
			assert_eq!(page.props["title"], json!("news"));
		})
		.await;
}

#[tokio::test(flavor = "current_thread")]
#[serial(reactive)]
async fn test_when_visible_always_reloads() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Feed", "/feed"));
			h.transport.respond("/feed", feed());
			let loader = h.router.when_visible(["comments"]).always(true).buffer(200);
			assert_eq!(loader.root_margin(), "200px");

			assert!(loader.handle_intersection(true));
			settle().await;
			assert!(loader.is_connected());
			assert!(loader.handle_intersection(true));
			settle().await;

			assert_eq!(h.transport.calls_to("/feed").len(), 2);
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_hover_prefetches_after_delay() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Home", "/"));
			h.transport.respond("/users", MockResponse::page(&Page::new("Users", "/users")));
			let hover = h.router.prefetch_on_hover("/users", VisitOptions::new(), None);

			hover.handle_enter();
			assert!(hover.is_pending());
			sleep(Duration::from_millis(50)).await;
			assert!(h.transport.calls().is_empty());

			sleep(Duration::from_millis(50)).await;
			settle().await;
			assert!(!hover.is_pending());
			assert_eq!(h.transport.calls_to("/users").len(), 1);
			assert!(h.router.session().prefetch().is_prefetched("/users"));
			assert_eq!(h.router.page().component, "Home");
		})
		.await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
#[serial(reactive)]
async fn test_hover_leave_cancels_prefetch() {
	let local = LocalSet::new();
	local
		.run_until(async {
			let h = harness(Page::new("Home", "/"));
			h.transport.respond("/users", MockResponse::page(&Page::new("Users", "/users")));
			let hover = h.router.prefetch_on_hover("/users", VisitOptions::new(), None);

			hover.handle_enter();
			sleep(Duration::from_millis(30)).await;
			hover.handle_leave();
			sleep(Duration::from_millis(500)).await;

			assert!(!hover.is_pending());
			assert!(h.transport.calls().is_empty());
		})
		.await;
}
