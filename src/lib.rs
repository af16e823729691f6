//! # pagewire
//!
//! Build single-page-style applications whose pages come from the server.
//!
//! The server answers every navigation with a *page*: a component name, its
//! props and the URL. pagewire keeps the current page in reactive state,
//! records it in browser history, and turns links, form submissions and
//! polling into requests that produce the next page.
//!
//! ## Crates
//!
//! - [`core`]: fine-grained reactive runtime and the page data model
//! - [`client`]: router, history, prefetch cache, forms and triggers
//! - `ssr`: render server and single-shot CLI (native targets only)
//!
//! ## Feature Flags
//!
//! - `client` (default) - Browser-side navigation runtime
//! - `ssr` - Server-side render endpoint and CLI
//! - `full` - Everything
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use pagewire::prelude::*;
//!
//! let app = App::boot(AppOptions::web())?;
//! let router = app.router();
//!
//! Effect::new({
//!     let router = router.clone();
//!     move || render(&router.page())
//! });
//!
//! router.visit("/users", VisitOptions::default()).await?;
//! ```

pub use pagewire_core as core;

#[cfg(feature = "client")]
pub use pagewire_client as client;

#[cfg(all(feature = "ssr", not(target_arch = "wasm32")))]
pub use pagewire_ssr as ssr;

pub use pagewire_core::{Effect, Page, PageError, Signal};

/// Common imports.
pub mod prelude {
	pub use pagewire_core::{Effect, Page, Signal, untrack};

	#[cfg(feature = "client")]
	pub use pagewire_client::prelude::*;

	#[cfg(all(feature = "ssr", not(target_arch = "wasm32")))]
	pub use pagewire_ssr::{Renderer, ShellRenderer, SsrServer};
}
