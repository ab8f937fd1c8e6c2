//! Configuration resolution for hubrelay.
//!
//! Implements layered config resolution:
//! 1. Built-in defaults
//! 2. TOML config file (optional)
//! 3. Environment variables
//! 4. CLI arguments (applied by the binary, highest priority)
//!
//! Credential material (keystore passphrase, published http key) has no
//! built-in default and must arrive through one of the outer layers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Port the device hub listens on unless told otherwise.
pub const DEFAULT_DEVICE_HUB_PORT: u16 = 9898;

/// Port the relay listens on for local callers.
pub const DEFAULT_RELAY_PORT: u16 = 58000;

/// Environment variable carrying the keystore passphrase.
pub const PASSPHRASE_ENV: &str = "HUBRELAY_KEYSTORE_PASSPHRASE";

/// Environment variable carrying the published http key.
pub const HTTP_KEY_ENV: &str = "HUBRELAY_HTTP_KEY";

/// Complete relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub listen: ListenConfig,
    pub peer: PeerConfig,
    pub keystore: KeyStoreConfig,
    pub bootstrap: BootstrapConfig,
    /// Decimal digit string served from the local utility endpoint.
    pub http_key: Option<String>,
    /// Upper bound on inbound request bodies.
    pub max_body_bytes: usize,
    /// Emit JSON log lines.
    pub log_json: bool,
}

/// Local listener address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_RELAY_PORT,
        }
    }
}

/// Device hub connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub host: String,
    pub port: u16,
    /// Name of the hub database holding authorized public keys.
    pub authorization_database: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_DEVICE_HUB_PORT,
            authorization_database: "thaliprincipaldatabase".to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 120,
        }
    }
}

impl PeerConfig {
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Local credential store settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    /// Directory holding the keystore file. Resolved by the binary when unset.
    pub directory: Option<PathBuf>,
    /// Alias of the relay's key-pair entry.
    pub alias: String,
    #[serde(skip_serializing)]
    pub passphrase: Option<String>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            alias: "relay-client".to_string(),
            passphrase: None,
        }
    }
}

impl std::fmt::Debug for KeyStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStoreConfig")
            .field("directory", &self.directory)
            .field("alias", &self.alias)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Retry settings for the trust bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Total attempts per bootstrap step (1 = no retry).
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

impl RelayConfig {
    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup(PASSPHRASE_ENV) {
            self.keystore.passphrase = Some(val);
        }
        if let Some(val) = lookup(HTTP_KEY_ENV) {
            self.http_key = Some(val);
        }
    }

    /// Check the resolved configuration before the relay starts.
    pub fn validate(&self) -> Result<()> {
        if self.listen.port == 0 {
            return Err(Error::Config("listen.port must be non-zero".into()));
        }
        if self.peer.port == 0 {
            return Err(Error::Config("peer.port must be non-zero".into()));
        }
        if self.peer.host.trim().is_empty() {
            return Err(Error::Config("peer.host is empty".into()));
        }
        if self.peer.authorization_database.trim().is_empty() {
            return Err(Error::Config("peer.authorization_database is empty".into()));
        }
        if self.keystore.alias.trim().is_empty() {
            return Err(Error::Config("keystore.alias is empty".into()));
        }
        match self.keystore.passphrase.as_deref() {
            None | Some("") => {
                return Err(Error::Config(format!(
                    "keystore passphrase is not set (use {PASSPHRASE_ENV} or --keystore-passphrase)"
                )));
            }
            Some(_) => {}
        }
        if let Some(key) = &self.http_key {
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Config("http_key must be a decimal digit string".into()));
            }
        }
        if self.bootstrap.max_attempts == 0 {
            return Err(Error::Config("bootstrap.max_attempts must be at least 1".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            peer: PeerConfig::default(),
            keystore: KeyStoreConfig::default(),
            bootstrap: BootstrapConfig::default(),
            http_key: None,
            max_body_bytes: 10 * 1024 * 1024, // 10 MB
            log_json: false,
        }
    }
}

/// Load configuration: defaults, then `path` (if given), then the process environment.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => RelayConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<RelayConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.keystore.passphrase = Some("hunter2".into());
        config
    }

    #[test]
    fn defaults_match_hub_conventions() {
        let config = RelayConfig::default();
        assert_eq!(config.listen.host, "localhost");
        assert_eq!(config.listen.port, 58000);
        assert_eq!(config.peer.host, "localhost");
        assert_eq!(config.peer.port, DEFAULT_DEVICE_HUB_PORT);
        assert!(config.http_key.is_none());
        assert!(config.keystore.passphrase.is_none());
    }

    #[test]
    fn missing_passphrase_is_rejected() {
        let config = RelayConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("passphrase"));
    }

    #[test]
    fn non_digit_http_key_is_rejected() {
        let mut config = valid();
        config.http_key = Some("12ab".into());
        assert!(config.validate().is_err());
        config.http_key = Some("4271728468".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = valid();
        config.bootstrap.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_credentials() {
        let mut config = RelayConfig::default();
        config.apply_env(|name| match name {
            PASSPHRASE_ENV => Some("from-env".into()),
            HTTP_KEY_ENV => Some("123".into()),
            _ => None,
        });
        assert_eq!(config.keystore.passphrase.as_deref(), Some("from-env"));
        assert_eq!(config.http_key.as_deref(), Some("123"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "http_key = \"42\"\n[peer]\nport = 9999\n[keystore]\nalias = \"phone\"\n",
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.peer.port, 9999);
        assert_eq!(config.peer.host, "localhost");
        assert_eq!(config.keystore.alias, "phone");
        assert_eq!(config.http_key.as_deref(), Some("42"));
        assert_eq!(config.listen.port, DEFAULT_RELAY_PORT);
    }

    #[test]
    fn debug_redacts_passphrase() {
        let config = valid();
        let rendered = format!("{:?}", config.keystore);
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_config_file(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
