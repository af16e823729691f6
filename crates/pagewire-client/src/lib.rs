//! # pagewire-client
//!
//! Browser-side runtime for server-driven pages. The server answers every
//! navigation with a page descriptor (component name, props, URL); this crate
//! keeps the current page in a reactive store, reconciles partial reloads,
//! writes history entries and drives forms, prefetching and polling.
//!
//! ## Modules
//!
//! - [`app`]: bootstrap from the page payload embedded in the host document
//! - [`router`]: visits, reconciliation and history commits
//! - [`http`]: transport-agnostic request pipeline with interceptors and extensions
//! - [`prefetch`]: TTL/stale cache of in-flight and completed responses
//! - [`form`]: reactive form state and submission
//! - [`history`]: history entry codec with optional AES-GCM encryption
//! - [`store`]: page store and remembered state
//! - [`triggers`]: polling, load-when-visible and hover prefetch
//! - [`platform`]: the [`Browser`](platform::Browser) abstraction
//!
//! ## Example
//!
//! ```no_run
//! use pagewire_client::prelude::*;
//! use std::rc::Rc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::new(
//! 	Session::in_memory("/"),
//! 	Rc::new(ReqwestTransport::with_base_url("https://example.com")),
//! 	Page::new("Home", "/"),
//! )?;
//! router.visit("/users", VisitOptions::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Everything is single-threaded: handles are `Rc`-based and background work
//! is spawned with [`pagewire_core::spawn::spawn_local`]. On native targets
//! run inside a `tokio::task::LocalSet`.

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod form;
pub mod history;
pub mod http;
pub mod platform;
pub mod prefetch;
pub mod router;
pub mod store;
pub mod testing;
pub mod time;
pub mod triggers;

pub use app::{App, AppOptions, BootError};
pub use config::{ClientConfig, ConfigError};
pub use context::Session;
pub use error::{ClientError, TransportError};
pub use form::{Form, FormError, FormState, use_form};
pub use router::{Router, RouterError, VisitOptions, VisitOutcome};

/// Common imports.
pub mod prelude {
	pub use crate::app::{App, AppOptions};
	pub use crate::context::Session;
	pub use crate::form::{Form, use_form};
	pub use crate::http::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
	pub use crate::prefetch::CacheFor;
	pub use crate::router::{Router, VisitOptions, VisitOutcome};
	pub use pagewire_core::{Effect, Page, Signal};
}
