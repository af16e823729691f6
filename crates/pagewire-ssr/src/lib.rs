//! # pagewire-ssr
//!
//! Server-side counterpart of the pagewire client: turns a page descriptor into
//! the markup the client boots from.
//!
//! Endpoints:
//!
//! | Method | Path      | Answer                                          |
//! |--------|-----------|-------------------------------------------------|
//! | `GET`  | `/up`     | `{"status":"OK","timestamp":<ms>}`              |
//! | `GET`  | `/down`   | `{"status":"OK"}`, then the server stops        |
//! | `POST` | `/render` | `{"head":[...],"body":"..."}` for a page body   |
//!
//! ```no_run
//! use std::sync::Arc;
//! use pagewire_ssr::{ShellRenderer, SsrConfig, SsrServer};
//!
//! # async fn run() -> Result<(), pagewire_ssr::SsrError> {
//! let config = SsrConfig::default();
//! let server = SsrServer::new(Arc::new(ShellRenderer::new(&config.root_id)));
//! server.listen(config.addr()?).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod render;
pub mod server;

pub use config::SsrConfig;
pub use error::SsrError;
pub use render::{RenderedPage, Renderer, ShellRenderer};
pub use server::SsrServer;
