//! End-to-end tests of the relay router against a scripted device hub.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, DATE, ETAG, ORIGIN,
    TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use hubrelay_relay::RelayError;
use hubrelay_relay::server::{
    OutboundRequest, PeerClient, PeerResponse, RelayState, UTILITY_PATH, build_router,
};
use hubrelay_relay::tls::PeerEndpoint;

/// Hub stand-in that counts calls and records the last request.
struct MockHub {
    calls: AtomicUsize,
    last: Mutex<Option<OutboundRequest>>,
    status: u16,
    headers: HeaderMap,
    body: &'static str,
    fail: bool,
}

impl MockHub {
    fn answering(status: u16, headers: HeaderMap, body: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
            status,
            headers,
            body,
            fail: false,
        }
    }

    fn ok() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::answering(200, headers, r#"{"ok":true}"#)
    }

    fn down() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> OutboundRequest {
        self.last.lock().unwrap().clone().expect("no request reached the hub")
    }
}

#[async_trait]
impl PeerClient for MockHub {
    async fn execute(&self, request: OutboundRequest) -> Result<PeerResponse, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request);
        if self.fail {
            return Err(RelayError::PeerCall("connection refused".into()));
        }
        Ok(PeerResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Body::from(self.body),
        })
    }
}

fn router_with(hub: &Arc<MockHub>, http_key: Option<&str>, max_body_bytes: usize) -> axum::Router {
    let state = Arc::new(RelayState {
        peer: Arc::clone(hub) as Arc<dyn PeerClient>,
        endpoint: PeerEndpoint::new("localhost", 9898),
        http_key: http_key.map(str::to_string),
    });
    build_router(state, max_body_bytes)
}

fn router(hub: &Arc<MockHub>) -> axum::Router {
    router_with(hub, Some("4271728468"), 1024 * 1024)
}

async fn send(router: axum::Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn assert_cors(response: &Response, origin: &str) {
    let headers = response.headers();
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], origin);
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(
        headers[ACCESS_CONTROL_ALLOW_HEADERS],
        "accept, content-type, authorization, origin"
    );
    assert_eq!(
        headers[ACCESS_CONTROL_ALLOW_METHODS],
        "GET, PUT, POST, DELETE, HEAD"
    );
}

#[tokio::test]
async fn options_short_circuits() {
    let hub = Arc::new(MockHub::ok());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/db/doc")
        .body(Body::empty())
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response, "*");
    assert_eq!(body_text(response).await, "OK");
    assert_eq!(hub.calls(), 0);
}

#[tokio::test]
async fn utility_endpoint_publishes_http_key() {
    let hub = Arc::new(MockHub::ok());
    let request = Request::builder()
        .uri("/RelayUtility/LocalHttpKey")
        .header(ORIGIN, "http://localhost:8080")
        .body(Body::empty())
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert_cors(&response, "http://localhost:8080");
    assert_eq!(body_text(response).await, "{'httpkey':'4271728468'}");
    assert_eq!(hub.calls(), 0);
}

#[tokio::test]
async fn utility_endpoint_without_key_is_not_found() {
    let hub = Arc::new(MockHub::ok());
    let request = Request::builder()
        .uri(UTILITY_PATH)
        .body(Body::empty())
        .unwrap();

    let response = send(router_with(&hub, None, 1024), request).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(&response, "*");
    assert_eq!(hub.calls(), 0);
}

#[tokio::test]
async fn get_is_relayed_with_query_and_headers() {
    let hub = Arc::new(MockHub::ok());
    let request = Request::builder()
        .uri("/db/_all_docs?include_docs=true")
        .header("accept", "application/json")
        .header(ORIGIN, "http://app.local")
        .body(Body::empty())
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert_cors(&response, "http://app.local");
    assert_eq!(body_text(response).await, r#"{"ok":true}"#);

    assert_eq!(hub.calls(), 1);
    let sent = hub.last();
    assert_eq!(sent.method, Method::GET);
    assert_eq!(sent.url, "https://localhost:9898/db/_all_docs?include_docs=true");
    assert_eq!(sent.headers["accept"], "application/json");
    assert!(sent.body.is_none());
}

#[tokio::test]
async fn put_body_is_forwarded_without_content_length() {
    let hub = Arc::new(MockHub::ok());
    let payload = r#"{"name":"thali"}"#;
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/db/doc1")
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let sent = hub.last();
    assert_eq!(sent.method, Method::PUT);
    assert_eq!(sent.body.as_deref(), Some(payload));
    assert!(sent.headers.get(CONTENT_LENGTH).is_none());
    assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn peer_statuses_are_folded() {
    for (peer, expected) in [
        (201, StatusCode::CREATED),
        (400, StatusCode::BAD_REQUEST),
        (404, StatusCode::NOT_FOUND),
        (409, StatusCode::OK),
        (412, StatusCode::PRECONDITION_FAILED),
        (500, StatusCode::INTERNAL_SERVER_ERROR),
        (503, StatusCode::OK),
    ] {
        let hub = Arc::new(MockHub::answering(peer, HeaderMap::new(), "x"));
        let request = Request::builder().uri("/db").body(Body::empty()).unwrap();
        let response = send(router(&hub), request).await;
        assert_eq!(response.status(), expected, "peer status {peer}");
        assert_cors(&response, "*");
    }
}

#[tokio::test]
async fn peer_headers_are_translated() {
    let mut headers = HeaderMap::new();
    headers.insert(DATE, HeaderValue::from_static("Mon, 01 Jan 2024 00:00:00 GMT"));
    headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(ETAG, HeaderValue::from_static("\"2-def\""));
    let hub = Arc::new(MockHub::answering(200, headers, "streamed"));
    let request = Request::builder().uri("/db/doc").body(Body::empty()).unwrap();

    let response = send(router(&hub), request).await;

    assert!(response.headers().get(DATE).is_none());
    assert!(response.headers().get(TRANSFER_ENCODING).is_none());
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[ETAG], "\"2-def\"");
    assert_eq!(body_text(response).await, "streamed");
}

#[tokio::test]
async fn peer_cors_headers_are_overridden() {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://hub"));
    let hub = Arc::new(MockHub::answering(200, headers, ""));
    let request = Request::builder()
        .uri("/db")
        .header(ORIGIN, "http://caller")
        .body(Body::empty())
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_cors(&response, "http://caller");
    assert_eq!(
        response
            .headers()
            .get_all(ACCESS_CONTROL_ALLOW_ORIGIN)
            .iter()
            .count(),
        1
    );
}

#[tokio::test]
async fn peer_failure_is_bad_gateway_with_cors() {
    let hub = Arc::new(MockHub::down());
    let request = Request::builder()
        .uri("/db/doc")
        .header(ORIGIN, "http://caller")
        .body(Body::empty())
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_cors(&response, "http://caller");
    assert!(body_text(response).await.contains("connection refused"));
    assert_eq!(hub.calls(), 1);
}

#[tokio::test]
async fn oversized_body_never_reaches_peer() {
    let hub = Arc::new(MockHub::ok());
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/db/doc")
        .body(Body::from(vec![b'a'; 64]))
        .unwrap();

    let response = send(router_with(&hub, None, 16), request).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_cors(&response, "*");
    assert_eq!(hub.calls(), 0);
}

#[tokio::test]
async fn undecodable_body_is_internal_error() {
    let hub = Arc::new(MockHub::ok());
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/db/doc")
        .body(Body::from(vec![0xc3, 0x28]))
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response, "*");
    assert!(body_text(response).await.starts_with("SERVER INTERNAL ERROR: "));
    assert_eq!(hub.calls(), 0);
}

#[tokio::test]
async fn multipart_post_forwards_first_field() {
    let hub = Arc::new(MockHub::ok());
    let payload = "--b\r\n\
        Content-Disposition: form-data; name=\"doc\"\r\n\r\n\
        {\"a\":1}\r\n\
        --b--\r\n";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/db")
        .header(CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(Body::from(payload))
        .unwrap();

    let response = send(router(&hub), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hub.last().body.as_deref(), Some(r#"{"a":1}"#));
}
