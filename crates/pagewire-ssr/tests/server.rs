use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use pagewire_core::Page;
use pagewire_ssr::{RenderedPage, Renderer, ShellRenderer, SsrError, SsrServer};
use rstest::rstest;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn body_json(response: http::Response<http_body_util::Full<Bytes>>) -> Value {
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	serde_json::from_slice(&bytes).unwrap()
}

fn server() -> SsrServer {
	SsrServer::new(Arc::new(ShellRenderer::default()))
}

struct Failing;

#[async_trait]
impl Renderer for Failing {
	async fn render(&self, _page: &Page) -> Result<RenderedPage, SsrError> {
		Err(SsrError::Render("component exploded".to_string()))
	}
}

#[rstest]
#[tokio::test]
async fn test_up_reports_timestamp() {
	let response = server().handle(&Method::GET, "/up", Bytes::new()).await;

	assert_eq!(response.status(), StatusCode::OK);
	let body = body_json(response).await;
	assert_eq!(body["status"], "OK");
	assert!(body["timestamp"].as_u64().unwrap() > 0);
}

#[rstest]
#[tokio::test]
async fn test_render_returns_head_and_body() {
	let page = json!({"component": "Home", "url": "/", "props": {"n": 1}, "version": "v1"});
	let response = server()
		.handle(&Method::POST, "/render", Bytes::from(page.to_string()))
		.await;

	assert_eq!(response.status(), StatusCode::OK);
	let body = body_json(response).await;
	assert_eq!(body["head"], json!([]));
	let markup = body["body"].as_str().unwrap();
	assert!(markup.starts_with(r#"<div id="app" data-page=""#));
	assert!(markup.contains("&quot;component&quot;:&quot;Home&quot;"));
}

#[rstest]
#[case::not_json("not json")]
#[case::missing_component(r#"{"url": "/"}"#)]
#[case::empty_url(r#"{"component": "Home", "url": ""}"#)]
#[tokio::test]
async fn test_render_rejects_invalid_page(#[case] payload: &'static str) {
	let response = server()
		.handle(&Method::POST, "/render", Bytes::from_static(payload.as_bytes()))
		.await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert!(body_json(response).await["error"].is_string());
}

#[rstest]
#[tokio::test]
async fn test_renderer_failure_is_server_error() {
	let server = SsrServer::new(Arc::new(Failing));
	let page = json!({"component": "Home", "url": "/"});
	let response = server
		.handle(&Method::POST, "/render", Bytes::from(page.to_string()))
		.await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body_json(response).await["error"], "render failed: component exploded");
}

#[rstest]
#[case(Method::GET, "/missing", StatusCode::NOT_FOUND)]
#[case(Method::GET, "/render", StatusCode::METHOD_NOT_ALLOWED)]
#[case(Method::DELETE, "/up", StatusCode::METHOD_NOT_ALLOWED)]
#[tokio::test]
async fn test_unrouted_requests(#[case] method: Method, #[case] path: &str, #[case] status: StatusCode) {
	let response = server().handle(&method, path, Bytes::new()).await;
	assert_eq!(response.status(), status);
}

async fn raw_get(addr: std::net::SocketAddr, path: &str) -> String {
	let mut stream = TcpStream::connect(addr).await.unwrap();
	let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
	stream.write_all(request.as_bytes()).await.unwrap();
	let mut response = String::new();
	stream.read_to_string(&mut response).await.unwrap();
	response
}

#[rstest]
#[tokio::test]
async fn test_down_stops_serving() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let server = server();
	let serving = tokio::spawn({
		let server = server.clone();
		async move { server.serve(listener).await }
	});

	let up = raw_get(addr, "/up").await;
	assert!(up.starts_with("HTTP/1.1 200 OK"));
	assert!(up.contains(r#""status":"OK""#));

	let down = raw_get(addr, "/down").await;
	assert!(down.starts_with("HTTP/1.1 200 OK"));

	let result = tokio::time::timeout(std::time::Duration::from_secs(5), serving)
		.await
		.expect("server did not stop")
		.unwrap();
	assert!(result.is_ok());
}
