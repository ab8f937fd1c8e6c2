//! Server certificate verifiers for the device hub connection.
//!
//! The hub presents a self-issued chain; there is no CA to anchor it. Its
//! identity is the public key of the chain's root (the last certificate it
//! sends, or the leaf when it sends no intermediates). Both verifiers require
//! every certificate to be signed by the next one and check the handshake
//! signature, so the root key vouches for a leaf key the peer holds.

use std::sync::{Arc, Mutex, PoisonError};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, Error as TlsError, SignatureScheme};
use tracing::{debug, warn};

use hubrelay_crypto::{CryptoError, PublicKeyInfo, verify_chain};

use crate::bootstrap::PeerIdentity;

/// Root of the presented chain.
pub fn chain_root<'a>(
    end_entity: &'a CertificateDer<'a>,
    intermediates: &'a [CertificateDer<'a>],
) -> &'a CertificateDer<'a> {
    intermediates.last().unwrap_or(end_entity)
}

/// Public key of the chain root, provided every link of the chain is signed
/// by its successor.
fn linked_root_key(
    end_entity: &CertificateDer<'_>,
    intermediates: &[CertificateDer<'_>],
) -> Result<PublicKeyInfo, TlsError> {
    let chain: Vec<&[u8]> = std::iter::once(&**end_entity)
        .chain(intermediates.iter().map(|cert| &**cert))
        .collect();
    verify_chain(&chain).map_err(|e| {
        warn!(error = %e, "Device hub presented an unusable certificate chain");
        match e {
            CryptoError::ChainVerification(_) => {
                TlsError::InvalidCertificate(CertificateError::BadSignature)
            }
            _ => TlsError::InvalidCertificate(CertificateError::BadEncoding),
        }
    })
}

/// Trust-on-first-use verifier: accepts any linked chain and remembers its root.
#[derive(Debug)]
pub struct CapturingVerifier {
    provider: Arc<CryptoProvider>,
    captured: Mutex<Option<Vec<u8>>>,
}

impl CapturingVerifier {
    pub const fn new(provider: Arc<CryptoProvider>) -> Self {
        Self {
            provider,
            captured: Mutex::new(None),
        }
    }

    /// DER of the root certificate seen in the most recent handshake.
    pub fn captured_root(&self) -> Option<Vec<u8>> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        linked_root_key(end_entity, intermediates)?;
        let root = chain_root(end_entity, intermediates);
        debug!(chain_len = intermediates.len() + 1, "Capturing device hub certificate chain");
        *self.captured.lock().unwrap_or_else(PoisonError::into_inner) = Some(root.to_vec());
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Accepts only linked chains whose root carries the pinned public key.
#[derive(Debug)]
pub struct PinnedVerifier {
    provider: Arc<CryptoProvider>,
    pinned: PeerIdentity,
}

impl PinnedVerifier {
    pub const fn new(provider: Arc<CryptoProvider>, pinned: PeerIdentity) -> Self {
        Self { provider, pinned }
    }
}

impl ServerCertVerifier for PinnedVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let presented = linked_root_key(end_entity, intermediates)?;

        if self.pinned.public_key().matches(&presented) {
            Ok(ServerCertVerified::assertion())
        } else {
            warn!(
                expected = %self.pinned.fingerprint(),
                actual = %presented.fingerprint(),
                "Device hub presented an unexpected public key"
            );
            Err(TlsError::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
