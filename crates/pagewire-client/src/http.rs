//! Transport-agnostic request pipeline.
//!
//! A [`Client`] owns a [`Transport`], an ordered list of request interceptors
//! and an ordered list of response interceptors. Extensions register
//! interceptors through [`install`] and hand back a [`Teardown`] that removes
//! them again. The pipeline knows nothing about the navigation protocol; that
//! lives in [`NavigationExtension`](crate::router::NavigationExtension).
//!
//! ```text
//! send(request)
//!   ├─ request interceptors (registration order)
//!   ├─ prefetch cache lookup ── fresh / stale ──► cached response
//!   │                        └─ miss ───────────► Transport::execute
//!   └─ response interceptors (registration order; on_response or on_error)
//! ```

mod extension;
mod pipeline;
mod request;
mod response;
mod transport;

pub use extension::{Extension, Teardown, install};
pub use pipeline::{Client, ErrorResolver, InterceptorId, RequestInterceptor, ResponseInterceptor};
pub use request::{HttpRequest, MultipartForm, Part, RequestBody};
pub use response::{HttpResponse, RequestConfig};
pub use transport::{ReqwestTransport, Transport};
