//! The relay request cycle.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use super::body::extract_body;
use super::cors::apply_cors;
use super::peer::{PeerClient, PeerResponse};
use super::request::{InboundRequest, build_outbound};
use super::translate::{RelayStatus, TranslatedHeaders, translate_headers};
use crate::error::{RelayError, error_chain};
use crate::tls::PeerEndpoint;

/// Local path that publishes the http key instead of relaying.
pub const UTILITY_PATH: &str = "/relayutility/localhttpkey";

/// Shared, read-only state for every relayed request.
pub struct RelayState {
    pub peer: Arc<dyn PeerClient>,
    pub endpoint: PeerEndpoint,
    pub http_key: Option<String>,
}

impl std::fmt::Debug for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayState")
            .field("endpoint", &self.endpoint)
            .field("http_key", &self.http_key.as_ref().map(|_| "[SET]"))
            .finish_non_exhaustive()
    }
}

/// Fallback handler: every method and path lands here.
pub async fn relay(State(state): State<Arc<RelayState>>, request: Request) -> Response {
    let origin = request.headers().get(ORIGIN).cloned();
    info!(
        uri = %request.uri(),
        method = %request.method(),
        origin = ?origin,
        "Relay request"
    );

    let mut response = match handle(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(status = %e.status(), error = %e, "Relay request failed");
            (e.status(), e.to_string()).into_response()
        }
    };
    apply_cors(response.headers_mut(), origin.as_ref());
    response
}

async fn handle(state: &RelayState, request: Request) -> Result<Response, RelayError> {
    if *request.method() == Method::OPTIONS {
        return Ok((StatusCode::OK, "OK").into_response());
    }
    if is_utility_request(request.uri()) {
        return Ok(utility_response(state.http_key.as_deref()));
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();
    let body = extract_body(request).await?;

    let inbound = InboundRequest::new(method, &uri, headers, body);
    let outbound = build_outbound(&state.endpoint, &inbound);
    debug!(url = %outbound.url, "Forwarding to device hub");

    let peer = state.peer.execute(outbound).await?;
    into_relay_response(peer).await
}

/// Case-insensitive match on path plus query.
fn is_utility_request(uri: &Uri) -> bool {
    uri.path_and_query()
        .is_some_and(|pq| pq.as_str().eq_ignore_ascii_case(UTILITY_PATH))
}

fn utility_response(http_key: Option<&str>) -> Response {
    match http_key {
        Some(key) => (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            format!("{{'httpkey':'{key}'}}"),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "http key not configured").into_response(),
    }
}

async fn into_relay_response(peer: PeerResponse) -> Result<Response, RelayError> {
    let TranslatedHeaders {
        headers,
        chunked,
        content_type,
    } = translate_headers(&peer.headers);
    let status = RelayStatus::from_peer(peer.status).status_code();

    let body = if chunked {
        peer.body
    } else {
        let bytes = to_bytes(peer.body, usize::MAX)
            .await
            .map_err(|e| RelayError::PeerCall(error_chain(&e)))?;
        Body::from(bytes)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    debug!(peer_status = peer.status, %status, chunked, "Translated device hub response");
    Ok(response)
}
