//! HTTPS implementation of [`HubTransport`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hubrelay_crypto::PublicKeyInfo;

use super::{HubTransport, PeerIdentity};
use crate::error::{BootstrapError, error_chain};
use crate::tls::SecureClientFactory;

/// Key type recorded in authorization entries.
pub const KEY_TYPE: &str = "spki-der";

/// Permission granted to the relay's key.
pub const RELAY_PERMISSION: &str = "relay";

/// Document stored in the hub's authorization database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    pub key_type: String,
    pub public_key: String,
    pub permission: String,
}

impl KeyEntry {
    pub fn for_relay(key: &PublicKeyInfo) -> Self {
        Self {
            key_type: KEY_TYPE.to_string(),
            public_key: key.to_base64(),
            permission: RELAY_PERMISSION.to_string(),
        }
    }
}

/// Talks to the hub over mutually authenticated HTTPS.
#[derive(Debug, Clone)]
pub struct HttpsHubTransport {
    factory: SecureClientFactory,
    database: String,
}

impl HttpsHubTransport {
    pub fn new(factory: SecureClientFactory, database: impl Into<String>) -> Self {
        Self {
            factory,
            database: database.into(),
        }
    }

    fn database_url(&self) -> String {
        self.factory.endpoint().url(&format!("/{}", self.database))
    }

    fn entry_url(&self, id: &str) -> String {
        self.factory
            .endpoint()
            .url(&format!("/{}/{id}", self.database))
    }

    async fn ensure_database(&self, client: &Client) -> Result<(), BootstrapError> {
        let response = client
            .put(self.database_url())
            .send()
            .await
            .map_err(peer_unreachable)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
            debug!(database = %self.database, %status, "Authorization database ready");
            Ok(())
        } else {
            Err(rejected(status, response).await)
        }
    }

    /// Whether the entry already stored under `id` carries `key`.
    async fn existing_entry_matches(
        &self,
        client: &Client,
        id: &str,
        key: &PublicKeyInfo,
    ) -> Result<bool, BootstrapError> {
        let response = client
            .get(self.entry_url(id))
            .send()
            .await
            .map_err(peer_unreachable)?;
        let status = response.status();
        if !status.is_success() {
            return Err(rejected(status, response).await);
        }
        let existing: KeyEntry =
            response
                .json()
                .await
                .map_err(|e| BootstrapError::RegistrationRejected {
                    status: StatusCode::CONFLICT.as_u16(),
                    message: format!("unreadable existing entry: {}", error_chain(&e)),
                })?;
        Ok(existing.key_type == KEY_TYPE && existing.public_key == key.to_base64())
    }
}

#[async_trait]
impl HubTransport for HttpsHubTransport {
    async fn retrieve_peer_key(&self) -> Result<PeerIdentity, BootstrapError> {
        let (client, verifier) = self.factory.unpinned()?;
        let url = self.factory.endpoint().url("/");
        let response = client.get(&url).send().await.map_err(peer_unreachable)?;
        debug!(url = %url, status = %response.status(), "Device hub answered unpinned request");

        let root = verifier.captured_root().ok_or_else(|| {
            BootstrapError::PeerIdentityMalformed("no certificate presented".into())
        })?;
        let key = PublicKeyInfo::from_certificate_der(&root)
            .map_err(|e| BootstrapError::PeerIdentityMalformed(e.to_string()))?;
        Ok(PeerIdentity::new(key))
    }

    async fn register_local_key(
        &self,
        peer: &PeerIdentity,
        local: &PublicKeyInfo,
    ) -> Result<(), BootstrapError> {
        let client = self.factory.pinned(peer)?;
        self.ensure_database(&client).await?;

        let id = local.fingerprint_hex();
        let response = client
            .put(self.entry_url(&id))
            .json(&KeyEntry::for_relay(local))
            .send()
            .await
            .map_err(peer_unreachable)?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::CONFLICT {
            if self.existing_entry_matches(&client, &id, local).await? {
                info!(id = %id, "Relay key already registered with device hub");
                return Ok(());
            }
            return Err(BootstrapError::RegistrationRejected {
                status: status.as_u16(),
                message: format!("a different key is registered under {id}"),
            });
        }
        Err(rejected(status, response).await)
    }
}

fn peer_unreachable(e: reqwest::Error) -> BootstrapError {
    BootstrapError::PeerUnreachable(error_chain(&e))
}

async fn rejected(status: StatusCode, response: reqwest::Response) -> BootstrapError {
    let message = response.text().await.unwrap_or_default();
    BootstrapError::RegistrationRejected {
        status: status.as_u16(),
        message,
    }
}
