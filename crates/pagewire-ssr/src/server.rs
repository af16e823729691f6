//! HTTP/1 render server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use pagewire_core::{Page, PageError};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::error::SsrError;
use crate::render::{RenderedPage, Renderer};

/// How long open connections get to finish after `/down`.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct ServerInner {
	renderer: Arc<dyn Renderer>,
	shutdown: broadcast::Sender<()>,
}

/// The render server. Clones share the renderer and the shutdown signal.
#[derive(Clone)]
pub struct SsrServer {
	inner: Arc<ServerInner>,
}

impl SsrServer {
	/// A server rendering with `renderer`.
	pub fn new(renderer: Arc<dyn Renderer>) -> Self {
		let (shutdown, _) = broadcast::channel(1);
		Self {
			inner: Arc::new(ServerInner { renderer, shutdown }),
		}
	}

	/// Asks a running [`serve`](Self::serve) loop to stop.
	pub fn shutdown(&self) {
		// no receiver just means nothing is serving yet
		let _ = self.inner.shutdown.send(());
	}

	/// Binds `addr` and serves until shut down.
	pub async fn listen(&self, addr: SocketAddr) -> Result<(), SsrError> {
		let listener = TcpListener::bind(addr).await?;
		self.serve(listener).await
	}

	/// Serves connections from `listener` until `/down` is requested or
	/// [`shutdown`](Self::shutdown) is called, then drains open connections.
	pub async fn serve(&self, listener: TcpListener) -> Result<(), SsrError> {
		let mut shutdown = self.inner.shutdown.subscribe();
		let mut connections = JoinSet::new();
		tracing::info!(addr = %listener.local_addr()?, "render server listening");

		loop {
			tokio::select! {
				accepted = listener.accept() => {
					let (stream, peer) = accepted?;
					let server = self.clone();
					connections.spawn(async move {
						let service = service_fn(move |request| {
							let server = server.clone();
							async move { server.dispatch(request).await }
						});
						if let Err(error) = http1::Builder::new().serve_connection(TokioIo::new(stream), service).await {
							tracing::warn!(%peer, %error, "connection failed");
						}
					});
				}
				_ = shutdown.recv() => {
					tracing::info!("shutdown requested; no longer accepting connections");
					break;
				}
			}
		}

		let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
			while connections.join_next().await.is_some() {}
		})
		.await;
		if drained.is_err() {
			tracing::warn!(remaining = connections.len(), "closing connections that did not finish");
			connections.abort_all();
		}
		Ok(())
	}

	async fn dispatch(&self, request: Request<Incoming>) -> Result<Response<Full<Bytes>>, hyper::Error> {
		let (parts, body) = request.into_parts();
		let body = body.collect().await?.to_bytes();
		Ok(self.handle(&parts.method, parts.uri.path(), body).await)
	}

	/// Answers one request.
	pub async fn handle(&self, method: &Method, path: &str, body: Bytes) -> Response<Full<Bytes>> {
		tracing::debug!(%method, path, "request");
		match path {
			"/up" if method == Method::GET => json_response(
				StatusCode::OK,
				&json!({"status": "OK", "timestamp": now_ms()}),
			),
			"/down" if method == Method::GET || method == Method::POST => {
				self.shutdown();
				let mut response = json_response(StatusCode::OK, &json!({"status": "OK"}));
				response
					.headers_mut()
					.insert(CONNECTION, HeaderValue::from_static("close"));
				response
			}
			"/render" if method == Method::POST => match self.render(&body).await {
				Ok(rendered) => match serde_json::to_value(rendered) {
					Ok(value) => json_response(StatusCode::OK, &value),
					Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string()),
				},
				Err(SsrError::Page(error)) => {
					tracing::debug!(%error, "rejected render request");
					error_response(StatusCode::BAD_REQUEST, &error.to_string())
				}
				Err(error) => {
					tracing::error!(%error, "render failed");
					error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
				}
			},
			"/up" | "/down" | "/render" => error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
			_ => error_response(StatusCode::NOT_FOUND, "not found"),
		}
	}

	async fn render(&self, body: &[u8]) -> Result<RenderedPage, SsrError> {
		let value: Value = serde_json::from_slice(body).map_err(PageError::from)?;
		let page = Page::from_value(value)?;
		self.inner.renderer.render(&page).await
	}
}

impl std::fmt::Debug for SsrServer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SsrServer")
			.field("listeners", &self.inner.shutdown.receiver_count())
			.finish_non_exhaustive()
	}
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
	let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
	*response.status_mut() = status;
	response
		.headers_mut()
		.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	response
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
	json_response(status, &json!({"error": message}))
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis() as u64)
		.unwrap_or(0)
}
