//! Passphrase-protected credential store.
//!
//! A single JSON file in the keystore directory maps aliases to sealed
//! entries. Each entry keeps the client certificate in the clear and the
//! PKCS#8 private key sealed with ChaCha20-Poly1305. The sealing key is
//! derived from the passphrase with Argon2id and a per-entry salt; the alias
//! is bound in as associated data so entries cannot be swapped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use argon2::Argon2;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use crate::certs::{ClientCertificate, generate_client_cert};
use crate::error::CryptoError;
use crate::identity::PublicKeyInfo;

/// File name of the store inside the keystore directory.
pub const KEYSTORE_FILE_NAME: &str = "relay-keystore.json";

const FORMAT_VERSION: u32 = 1;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
struct KeyStoreFile {
    version: u32,
    entries: BTreeMap<String, SealedEntry>,
}

impl Default for KeyStoreFile {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedEntry {
    /// Base64 DER certificate.
    certificate: String,
    salt: String,
    nonce: String,
    /// Base64 ciphertext of the PKCS#8 private key (includes the auth tag).
    sealed_key: String,
}

/// The relay's client identity, unsealed and ready for a TLS handshake.
pub struct RelayCredentials {
    alias: String,
    cert_der: Vec<u8>,
    key_der: Zeroizing<Vec<u8>>,
    public_key: PublicKeyInfo,
}

impl std::fmt::Debug for RelayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayCredentials")
            .field("alias", &self.alias)
            .field("public_key", &self.public_key)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl RelayCredentials {
    fn new(alias: &str, cert_der: Vec<u8>, key_der: Zeroizing<Vec<u8>>) -> Result<Self, CryptoError> {
        let public_key = PublicKeyInfo::from_certificate_der(&cert_der)?;
        Ok(Self {
            alias: alias.to_string(),
            cert_der,
            key_der,
            public_key,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// DER client certificate.
    pub fn certificate_der(&self) -> &[u8] {
        &self.cert_der
    }

    /// PKCS#8 DER private key. Handle with care.
    pub fn private_key_der(&self) -> &[u8] {
        &self.key_der
    }

    pub const fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }
}

/// On-disk credential store.
#[derive(Debug)]
pub struct KeyStore {
    path: PathBuf,
    file: KeyStoreFile,
}

impl KeyStore {
    /// Open the store in `dir`. A missing file yields an empty store.
    pub fn open(dir: &Path) -> Result<Self, CryptoError> {
        let path = dir.join(KEYSTORE_FILE_NAME);
        if !path.exists() {
            return Ok(Self {
                path,
                file: KeyStoreFile::default(),
            });
        }
        let data = std::fs::read_to_string(&path)?;
        let file: KeyStoreFile = serde_json::from_str(&data).map_err(|e| {
            CryptoError::SerializationError(format!("Failed to parse keystore: {e}"))
        })?;
        if file.version != FORMAT_VERSION {
            return Err(CryptoError::SerializationError(format!(
                "Unsupported keystore version {}",
                file.version
            )));
        }
        Ok(Self { path, file })
    }

    /// Write the store back to disk with owner-only permissions.
    pub fn save(&self) -> Result<(), CryptoError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.file).map_err(|e| {
            CryptoError::SerializationError(format!("Failed to serialize keystore: {e}"))
        })?;
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.file.entries.contains_key(alias)
    }

    /// Unseal the entry stored under `alias`.
    pub fn get(&self, alias: &str, passphrase: &str) -> Result<Option<RelayCredentials>, CryptoError> {
        let Some(entry) = self.file.entries.get(alias) else {
            return Ok(None);
        };
        let cert_der = decode_field("certificate", &entry.certificate)?;
        let salt = decode_field("salt", &entry.salt)?;
        let nonce = decode_field("nonce", &entry.nonce)?;
        let sealed = decode_field("sealed_key", &entry.sealed_key)?;
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::SerializationError(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                nonce.len()
            )));
        }

        let key = derive_key(passphrase, &salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let key_der = cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &sealed,
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|_| {
                CryptoError::DecryptionFailed(format!(
                    "wrong passphrase or corrupted entry for alias '{alias}'"
                ))
            })?;

        RelayCredentials::new(alias, cert_der, Zeroizing::new(key_der)).map(Some)
    }

    /// Seal `cert` under `alias`, replacing any existing entry. Not persisted until `save`.
    pub fn insert(
        &mut self,
        alias: &str,
        passphrase: &str,
        cert: &ClientCertificate,
    ) -> Result<(), CryptoError> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let key = derive_key(passphrase, &salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: cert.key_der.as_slice(),
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        self.file.entries.insert(
            alias.to_string(),
            SealedEntry {
                certificate: STANDARD.encode(&cert.cert_der),
                salt: STANDARD.encode(salt),
                nonce: STANDARD.encode(nonce),
                sealed_key: STANDARD.encode(sealed),
            },
        );
        Ok(())
    }

    /// Return the credentials under `alias`, generating and persisting them
    /// first if the store or the entry does not exist yet.
    pub fn load_or_create(
        dir: &Path,
        alias: &str,
        passphrase: &str,
    ) -> Result<RelayCredentials, CryptoError> {
        let mut store = Self::open(dir)?;
        if let Some(credentials) = store.get(alias, passphrase)? {
            info!(
                alias,
                fingerprint = %credentials.public_key().fingerprint(),
                "Loaded relay credentials"
            );
            return Ok(credentials);
        }

        let generated = generate_client_cert(alias)?;
        store.insert(alias, passphrase, &generated)?;
        store.save()?;

        let credentials = RelayCredentials::new(alias, generated.cert_der, generated.key_der)?;
        info!(
            alias,
            path = %store.path().display(),
            fingerprint = %credentials.public_key().fingerprint(),
            "Generated relay credentials"
        );
        Ok(credentials)
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut_slice())
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(key)
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::SerializationError(format!("invalid base64 in {name}: {e}")))
}
