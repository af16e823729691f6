use super::pipeline::Client;

/// Undoes an extension's registrations.
///
/// Teardowns compose with [`and`](Self::and); [`run`](Self::run) executes every
/// collected step in the order it was added.
#[must_use = "dropping a Teardown leaves the extension installed"]
#[derive(Default)]
pub struct Teardown {
	steps: Vec<Box<dyn FnOnce()>>,
}

impl Teardown {
	/// A teardown running `f`.
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce() + 'static,
	{
		Self {
			steps: vec![Box::new(f)],
		}
	}

	/// A teardown that does nothing.
	pub fn noop() -> Self {
		Self::default()
	}

	/// Combines two teardowns.
	pub fn and(mut self, other: Teardown) -> Self {
		self.steps.extend(other.steps);
		self
	}

	/// Runs every step.
	pub fn run(self) {
		for step in self.steps {
			step();
		}
	}
}

impl std::fmt::Debug for Teardown {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Teardown")
			.field("steps", &self.steps.len())
			.finish()
	}
}

/// Something that plugs interceptors into a [`Client`].
///
/// Any `Fn(&Client) -> Teardown` is an extension.
pub trait Extension {
	/// Registers interceptors and returns how to remove them.
	fn install(&self, client: &Client) -> Teardown;
}

impl<F> Extension for F
where
	F: Fn(&Client) -> Teardown,
{
	fn install(&self, client: &Client) -> Teardown {
		self(client)
	}
}

/// Installs `extensions` in order and returns one combined teardown.
///
/// ```
/// use pagewire_client::http::{Client, Extension, Teardown, install};
/// use pagewire_client::prefetch::PrefetchCache;
/// use pagewire_client::testing::MockTransport;
/// use pagewire_client::time::ManualClock;
/// use std::rc::Rc;
///
/// let client = Client::new(Rc::new(MockTransport::new()), PrefetchCache::new(Rc::new(ManualClock::new())));
/// let tag = |client: &Client| {
///     let id = client.on_request(|request| request.insert_header("x-tag", "1"));
///     let client = client.clone();
///     Teardown::new(move || {
///         client.eject(id);
///     })
/// };
///
/// let teardown = install(&client, &[&tag as &dyn Extension]);
/// assert_eq!(client.interceptor_count(), 1);
/// teardown.run();
/// assert_eq!(client.interceptor_count(), 0);
/// ```
pub fn install(client: &Client, extensions: &[&dyn Extension]) -> Teardown {
	extensions
		.iter()
		.fold(Teardown::noop(), |teardown, extension| teardown.and(extension.install(client)))
}
