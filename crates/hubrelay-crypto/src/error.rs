//! Crypto error types.

/// Errors from credential and key handling.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Certificate generation error: {0}")]
    CertificateGeneration(String),

    #[error("Certificate parse error: {0}")]
    CertificateParse(String),

    #[error("Certificate chain rejected: {0}")]
    ChainVerification(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error")]
    IoError(#[from] std::io::Error),
}
