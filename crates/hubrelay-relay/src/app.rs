//! Relay start-up: credentials, trust bootstrap, pinned client, listener.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use hubrelay_core::RelayConfig;
use hubrelay_crypto::{KeyStore, RelayCredentials};

use crate::bootstrap::{HttpsHubTransport, PeerIdentity, RetryPolicy, TrustBootstrapper};
use crate::error::StartupError;
use crate::server::{self, RelayState, ReqwestPeerClient};
use crate::tls::{PeerEndpoint, PeerTimeouts, SecureClientFactory};

/// A relay that has completed its bootstrap and is ready to bind.
#[derive(Debug)]
pub struct PreparedRelay {
    peer: PeerIdentity,
    router: Router,
    listen: (String, u16),
}

impl PreparedRelay {
    pub const fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Bind the local listener and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind((self.listen.0.as_str(), self.listen.1)).await?;
        server::serve(listener, self.router, shutdown).await?;
        Ok(())
    }
}

/// Load (or create) the relay's credentials from `keystore_dir`.
pub fn load_credentials(
    config: &RelayConfig,
    keystore_dir: &Path,
) -> Result<RelayCredentials, StartupError> {
    let passphrase = config.keystore.passphrase.as_deref().unwrap_or_default();
    let credentials = KeyStore::load_or_create(keystore_dir, &config.keystore.alias, passphrase)?;
    info!(
        alias = %credentials.alias(),
        fingerprint = %credentials.public_key().fingerprint(),
        "Relay credentials ready"
    );
    Ok(credentials)
}

/// Run every start-up step that must finish before the listener is bound.
pub async fn prepare(
    config: &RelayConfig,
    credentials: RelayCredentials,
) -> Result<PreparedRelay, StartupError> {
    config.validate()?;

    let credentials = Arc::new(credentials);
    let endpoint = PeerEndpoint::from(&config.peer);
    let factory = SecureClientFactory::new(
        endpoint.clone(),
        Arc::clone(&credentials),
        PeerTimeouts::from(&config.peer),
    );

    let transport =
        HttpsHubTransport::new(factory.clone(), config.peer.authorization_database.clone());
    let mut bootstrapper = TrustBootstrapper::new(
        transport,
        credentials.public_key().clone(),
        RetryPolicy::from(&config.bootstrap),
    );
    let peer = bootstrapper.run().await?;

    let client = factory.pinned(&peer)?;
    let state = Arc::new(RelayState {
        peer: Arc::new(ReqwestPeerClient::new(client)),
        endpoint,
        http_key: config.http_key.clone(),
    });

    Ok(PreparedRelay {
        peer,
        router: server::build_router(state, config.max_body_bytes),
        listen: (config.listen.host.clone(), config.listen.port),
    })
}
