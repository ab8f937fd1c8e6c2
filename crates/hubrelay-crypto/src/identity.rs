//! Public key identity.
//!
//! Both ends of the relay link are identified by the DER-encoded
//! `SubjectPublicKeyInfo` of a certificate they present. Pinning compares
//! these bytes; fingerprints exist for logs and document ids.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

/// DER-encoded `SubjectPublicKeyInfo`.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    spki_der: Vec<u8>,
}

impl std::fmt::Debug for PublicKeyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyInfo")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl PublicKeyInfo {
    /// Wrap raw SPKI bytes without parsing them.
    pub const fn from_spki_der(spki_der: Vec<u8>) -> Self {
        Self { spki_der }
    }

    /// Extract the subject public key from a DER-encoded X.509 certificate.
    pub fn from_certificate_der(cert_der: &[u8]) -> Result<Self, CryptoError> {
        let (_, cert) = x509_parser::parse_x509_certificate(cert_der)
            .map_err(|e| CryptoError::CertificateParse(e.to_string()))?;
        let raw = cert.public_key().raw;
        if raw.is_empty() {
            return Err(CryptoError::CertificateParse(
                "certificate carries an empty public key".into(),
            ));
        }
        Ok(Self {
            spki_der: raw.to_vec(),
        })
    }

    pub fn as_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Standard base64 of the SPKI bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.spki_der)
    }

    /// Colon-separated SHA-256 fingerprint, for humans.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.spki_der)
    }

    /// Plain lowercase SHA-256 hex, usable as a document id.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.spki_der))
    }

    /// Constant-time equality against another key.
    pub fn matches(&self, other: &Self) -> bool {
        self.spki_der.as_slice().ct_eq(other.spki_der.as_slice()).into()
    }
}

/// Compute a colon-separated hex fingerprint from raw public key bytes.
pub fn fingerprint_of(pubkey_bytes: &[u8]) -> String {
    let hash = Sha256::digest(pubkey_bytes);
    hash.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
