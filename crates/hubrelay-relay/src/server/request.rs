//! Inbound and outbound request shapes.

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderName, Method, Uri};

use crate::tls::PeerEndpoint;

/// Whether an inbound header is passed on to the peer. `content-length` is
/// recomputed by the peer client.
pub fn is_forwarded(name: &HeaderName) -> bool {
    *name != CONTENT_LENGTH
}

/// A local caller's request after body extraction.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl InboundRequest {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Option<String>) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        }
    }
}

/// The request sent to the device hub.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// Map an inbound request onto the peer endpoint.
pub fn build_outbound(endpoint: &PeerEndpoint, inbound: &InboundRequest) -> OutboundRequest {
    let url = match inbound.query.as_deref() {
        Some(query) if !query.is_empty() => endpoint.url(&format!("{}?{query}", inbound.path)),
        _ => endpoint.url(&inbound.path),
    };

    let mut headers = HeaderMap::with_capacity(inbound.headers.len());
    for (name, value) in &inbound.headers {
        if is_forwarded(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    OutboundRequest {
        method: inbound.method.clone(),
        url,
        headers,
        body: inbound.body.clone(),
    }
}
