//! Client certificate generation for the relay's mTLS identity.
//!
//! The device hub authorizes callers by public key, not by issuer, so the
//! relay presents a self-signed certificate whose only job is to carry its
//! key pair into the TLS handshake.

use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// DER-encoded client certificate and its PKCS#8 private key.
pub struct ClientCertificate {
    pub cert_der: Vec<u8>,
    pub key_der: Zeroizing<Vec<u8>>,
}

/// Generate a fresh key pair and a self-signed client-auth certificate.
///
/// The alias becomes the certificate's Common Name.
pub fn generate_client_cert(alias: &str) -> Result<ClientCertificate, CryptoError> {
    let mut params = CertificateParams::new(Vec::<String>::new())
        .map_err(|e| CryptoError::CertificateGeneration(e.to_string()))?;
    params.distinguished_name.push(DnType::CommonName, alias);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "hubrelay");
    params.key_usages.push(KeyUsagePurpose::DigitalSignature);
    params
        .extended_key_usages
        .push(ExtendedKeyUsagePurpose::ClientAuth);

    let key_pair =
        KeyPair::generate().map_err(|e| CryptoError::CertificateGeneration(e.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CryptoError::CertificateGeneration(e.to_string()))?;

    Ok(ClientCertificate {
        cert_der: cert.der().to_vec(),
        key_der: Zeroizing::new(key_pair.serialize_der()),
    })
}
