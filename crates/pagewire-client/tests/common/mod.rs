//! Shared fixtures for the client integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use pagewire_client::config::ClientConfig;
use pagewire_client::context::Session;
use pagewire_client::platform::MemoryBrowser;
use pagewire_client::router::Router;
use pagewire_client::testing::MockTransport;
use pagewire_client::time::ManualClock;
use pagewire_core::Page;

pub struct Harness {
	pub browser: Rc<MemoryBrowser>,
	pub transport: Rc<MockTransport>,
	pub clock: Rc<ManualClock>,
	pub router: Router,
}

pub fn harness(page: Page) -> Harness {
	harness_with(ClientConfig::default(), page)
}

pub fn harness_with(config: ClientConfig, page: Page) -> Harness {
	let browser = Rc::new(MemoryBrowser::new(page.url.clone()));
	let transport = Rc::new(MockTransport::new());
	let clock = Rc::new(ManualClock::new());
	let session = Session::with_clock(config, browser.clone(), clock.clone());
	let router = Router::new(session, transport.clone(), page).unwrap();
	Harness {
		browser,
		transport,
		clock,
		router,
	}
}

/// Lets spawned local tasks run to completion.
pub async fn settle() {
	for _ in 0..32 {
		tokio::task::yield_now().await;
	}
}
