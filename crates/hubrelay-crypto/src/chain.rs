//! Certificate chain linkage.
//!
//! A peer is pinned by the key of the last certificate it presents. That key
//! only speaks for the connection if every certificate before it was signed
//! by its successor.

use x509_parser::certificate::X509Certificate;

use crate::error::CryptoError;
use crate::identity::PublicKeyInfo;

/// Check that `chain` (leaf first) links up to its last certificate and
/// return that certificate's public key.
///
/// A single certificate is its own root. The root's self-signature is not
/// checked; trust in it comes from pinning.
pub fn verify_chain(chain: &[&[u8]]) -> Result<PublicKeyInfo, CryptoError> {
    let parsed = chain
        .iter()
        .map(|der| {
            x509_parser::parse_x509_certificate(der)
                .map(|(_, cert)| cert)
                .map_err(|e| CryptoError::CertificateParse(e.to_string()))
        })
        .collect::<Result<Vec<X509Certificate<'_>>, _>>()?;

    for (depth, pair) in parsed.windows(2).enumerate() {
        let (child, issuer) = (&pair[0], &pair[1]);
        child
            .verify_signature(Some(issuer.public_key()))
            .map_err(|e| {
                CryptoError::ChainVerification(format!(
                    "certificate {depth} is not signed by certificate {}: {e}",
                    depth + 1
                ))
            })?;
    }

    let root = parsed
        .last()
        .ok_or_else(|| CryptoError::ChainVerification("empty certificate chain".into()))?;
    let raw = root.public_key().raw;
    if raw.is_empty() {
        return Err(CryptoError::CertificateParse(
            "certificate carries an empty public key".into(),
        ));
    }
    Ok(PublicKeyInfo::from_spki_der(raw.to_vec()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use rcgen::{
        BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair, KeyUsagePurpose,
    };

    use crate::certs::generate_client_cert;

    struct Authority {
        cert_der: Vec<u8>,
        params: CertificateParams,
        key_pair: KeyPair,
    }

    fn authority(name: &str) -> Authority {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages.push(KeyUsagePurpose::KeyCertSign);
        let key_pair = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        Authority {
            cert_der: cert.der().to_vec(),
            params,
            key_pair,
        }
    }

    fn leaf_signed_by(ca: &Authority) -> Vec<u8> {
        let params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let key = KeyPair::generate().unwrap();
        let issuer = Issuer::from_params(&ca.params, &ca.key_pair);
        params.signed_by(&key, &issuer).unwrap().der().to_vec()
    }

    #[test]
    fn linked_chain_yields_root_key() {
        let ca = authority("hub root");
        let leaf = leaf_signed_by(&ca);

        let root = verify_chain(&[leaf.as_slice(), ca.cert_der.as_slice()]).unwrap();
        assert_eq!(root, PublicKeyInfo::from_certificate_der(&ca.cert_der).unwrap());
    }

    #[test]
    fn single_certificate_is_its_own_root() {
        let cert = generate_client_cert("hub").unwrap();
        let root = verify_chain(&[cert.cert_der.as_slice()]).unwrap();
        assert_eq!(root, PublicKeyInfo::from_certificate_der(&cert.cert_der).unwrap());
    }

    #[test]
    fn foreign_leaf_in_front_of_root_is_rejected() {
        let ca = authority("hub root");
        let foreign = generate_client_cert("intruder").unwrap();

        let err =
            verify_chain(&[foreign.cert_der.as_slice(), ca.cert_der.as_slice()]).unwrap_err();
        assert!(matches!(err, CryptoError::ChainVerification(_)), "{err}");
    }

    #[test]
    fn leaf_from_other_authority_is_rejected() {
        let ca = authority("hub root");
        let other = authority("other root");
        let leaf = leaf_signed_by(&other);

        assert!(matches!(
            verify_chain(&[leaf.as_slice(), ca.cert_der.as_slice()]),
            Err(CryptoError::ChainVerification(_))
        ));
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(matches!(
            verify_chain(&[]),
            Err(CryptoError::ChainVerification(_))
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            verify_chain(&[[0x30_u8, 0x01, 0x00].as_slice()]),
            Err(CryptoError::CertificateParse(_))
        ));
    }
}
