//! Local HTTP front of the relay.

pub mod body;
pub mod cors;
pub mod handler;
pub mod peer;
pub mod request;
pub mod translate;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handler::{RelayState, UTILITY_PATH, relay};
pub use peer::{PeerClient, PeerResponse, ReqwestPeerClient};
pub use request::{InboundRequest, OutboundRequest, build_outbound};
pub use translate::{RelayStatus, TranslatedHeaders, translate_headers};

/// Router that relays every method and path.
pub fn build_router(state: Arc<RelayState>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(relay)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Relay listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
