//! Mutual-TLS HTTP clients for the device hub.
//!
//! Every client presents the relay's certificate. What differs is how the
//! hub's certificate is judged: the bootstrap client captures whatever the
//! hub presents, every later client is pinned to that capture.

use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::debug;

use hubrelay_core::config::PeerConfig;
use hubrelay_crypto::RelayCredentials;

use super::verifier::{CapturingVerifier, PinnedVerifier};
use crate::bootstrap::PeerIdentity;
use crate::error::TlsSetupError;

/// Where the device hub lives. The scheme is always `https`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoint {
    pub host: String,
    pub port: u16,
}

impl PeerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `https://host:port`, no trailing slash.
    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }

    /// Absolute URL for a path that starts with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }
}

impl From<&PeerConfig> for PeerEndpoint {
    fn from(config: &PeerConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

/// Connect and read timeouts for the peer leg.
#[derive(Debug, Clone, Copy)]
pub struct PeerTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl From<&PeerConfig> for PeerTimeouts {
    fn from(config: &PeerConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            read: config.read_timeout(),
        }
    }
}

/// Builds `reqwest` clients that authenticate to the hub with the relay's credentials.
#[derive(Debug, Clone)]
pub struct SecureClientFactory {
    endpoint: PeerEndpoint,
    credentials: Arc<RelayCredentials>,
    timeouts: PeerTimeouts,
    provider: Arc<CryptoProvider>,
}

impl SecureClientFactory {
    pub fn new(
        endpoint: PeerEndpoint,
        credentials: Arc<RelayCredentials>,
        timeouts: PeerTimeouts,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            timeouts,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    pub const fn endpoint(&self) -> &PeerEndpoint {
        &self.endpoint
    }

    /// Client with no pinned hub key. The returned verifier exposes the
    /// certificate chain root the hub presented.
    pub fn unpinned(&self) -> Result<(reqwest::Client, Arc<CapturingVerifier>), TlsSetupError> {
        let verifier = Arc::new(CapturingVerifier::new(Arc::clone(&self.provider)));
        let client = self.build(Arc::clone(&verifier) as Arc<dyn ServerCertVerifier>)?;
        debug!(endpoint = %self.endpoint.base_url(), "Built unpinned device hub client");
        Ok((client, verifier))
    }

    /// Client that only talks to a hub presenting `peer`'s key.
    pub fn pinned(&self, peer: &PeerIdentity) -> Result<reqwest::Client, TlsSetupError> {
        let verifier = Arc::new(PinnedVerifier::new(Arc::clone(&self.provider), peer.clone()));
        let client = self.build(verifier)?;
        debug!(
            endpoint = %self.endpoint.base_url(),
            peer = %peer.fingerprint(),
            "Built pinned device hub client"
        );
        Ok(client)
    }

    fn build(
        &self,
        verifier: Arc<dyn ServerCertVerifier>,
    ) -> Result<reqwest::Client, TlsSetupError> {
        let cert = CertificateDer::from(self.credentials.certificate_der().to_vec());
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            self.credentials.private_key_der().to_vec(),
        ));

        let tls = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_auth_cert(vec![cert], key)?;

        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .connect_timeout(self.timeouts.connect)
            .read_timeout(self.timeouts.read)
            .no_proxy()
            .build()?;
        Ok(client)
    }
}
