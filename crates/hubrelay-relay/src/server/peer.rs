//! The device hub call made for each relayed request.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::HeaderMap;
use tracing::warn;

use super::request::OutboundRequest;
use crate::error::{RelayError, error_chain};

/// What came back from the hub, before translation.
pub struct PeerResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Body,
}

impl std::fmt::Debug for PeerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes one outbound request against the hub.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<PeerResponse, RelayError>;
}

/// [`PeerClient`] backed by a `reqwest::Client` pinned to the hub's key.
#[derive(Debug, Clone)]
pub struct ReqwestPeerClient {
    client: reqwest::Client,
}

impl ReqwestPeerClient {
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PeerClient for ReqwestPeerClient {
    async fn execute(&self, request: OutboundRequest) -> Result<PeerResponse, RelayError> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            let message = error_chain(&e);
            warn!(method = %method, url = %url, error = %message, "Device hub call failed");
            RelayError::PeerCall(message)
        })?;

        Ok(PeerResponse {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}
