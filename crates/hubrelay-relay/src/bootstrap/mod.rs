//! Mutual-trust bootstrap with the device hub.
//!
//! Before the relay serves anything it learns the hub's public key (trust on
//! first use) and then registers its own key in the hub's authorization
//! database over a channel pinned to that key.
//!
//! ```text
//! PeerKeyUnknown --retrieve--> PeerKeyPinned --register--> Registered
//! ```
//!
//! Each transition may fail with a typed [`BootstrapError`]; transport
//! failures are retried with backoff, everything else aborts immediately.

pub mod retry;
pub mod transport;

use std::future::Future;

use async_trait::async_trait;
use tracing::{error, info, warn};

use hubrelay_crypto::PublicKeyInfo;

use crate::error::BootstrapError;

pub use retry::RetryPolicy;
pub use transport::HttpsHubTransport;

/// The device hub's public key, pinned for the lifetime of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity(PublicKeyInfo);

impl PeerIdentity {
    pub const fn new(key: PublicKeyInfo) -> Self {
        Self(key)
    }

    pub const fn public_key(&self) -> &PublicKeyInfo {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        self.0.fingerprint()
    }
}

/// Where the bootstrap currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustState {
    PeerKeyUnknown,
    PeerKeyPinned(PeerIdentity),
    Registered(PeerIdentity),
}

/// Network side of the bootstrap.
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Connect without a pinned key and report the key the hub presented.
    async fn retrieve_peer_key(&self) -> Result<PeerIdentity, BootstrapError>;

    /// Register `local` with the hub over a channel pinned to `peer`.
    async fn register_local_key(
        &self,
        peer: &PeerIdentity,
        local: &PublicKeyInfo,
    ) -> Result<(), BootstrapError>;
}

/// Drives [`TrustState`] from `PeerKeyUnknown` to `Registered`.
pub struct TrustBootstrapper<T> {
    transport: T,
    local_key: PublicKeyInfo,
    policy: RetryPolicy,
    state: TrustState,
}

impl<T: HubTransport> TrustBootstrapper<T> {
    pub const fn new(transport: T, local_key: PublicKeyInfo, policy: RetryPolicy) -> Self {
        Self {
            transport,
            local_key,
            policy,
            state: TrustState::PeerKeyUnknown,
        }
    }

    pub const fn state(&self) -> &TrustState {
        &self.state
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the bootstrap to completion and return the pinned hub identity.
    ///
    /// On failure the state stays at the last transition that succeeded.
    pub async fn run(&mut self) -> Result<PeerIdentity, BootstrapError> {
        loop {
            self.state = match std::mem::replace(&mut self.state, TrustState::PeerKeyUnknown) {
                TrustState::PeerKeyUnknown => {
                    let peer = self
                        .with_retry("retrieve peer key", || self.transport.retrieve_peer_key())
                        .await?;
                    info!(peer = %peer.fingerprint(), "Pinned device hub public key");
                    TrustState::PeerKeyPinned(peer)
                }
                TrustState::PeerKeyPinned(peer) => {
                    let registered = self
                        .with_retry("register local key", || {
                            self.transport.register_local_key(&peer, &self.local_key)
                        })
                        .await;
                    if let Err(e) = registered {
                        self.state = TrustState::PeerKeyPinned(peer);
                        return Err(e);
                    }
                    info!(
                        local = %self.local_key.fingerprint(),
                        "Registered relay public key with device hub"
                    );
                    TrustState::Registered(peer)
                }
                TrustState::Registered(peer) => {
                    self.state = TrustState::Registered(peer.clone());
                    return Ok(peer);
                }
            };
        }
    }

    async fn with_retry<F, Fut, R>(&self, step: &str, mut op: F) -> Result<R, BootstrapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, BootstrapError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && self.policy.should_retry(attempt + 1) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        step,
                        attempt = attempt + 1,
                        error = %e,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Bootstrap step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(step, attempts = attempt + 1, error = %e, "Bootstrap step failed");
                    return Err(e);
                }
            }
        }
    }
}
