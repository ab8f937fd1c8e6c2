//! `hubrelay` credential library
//!
//! Holds the relay's client identity and the primitives used to pin the
//! device hub's identity.
//!
//! ## Pieces
//!
//! - **Key store**: one aliased key pair + self-signed client certificate per
//!   entry, private key sealed with ChaCha20-Poly1305 under an Argon2id key
//! - **Public key info**: DER `SubjectPublicKeyInfo` pulled out of X.509
//!   certificates, with SHA-256 fingerprints and constant-time comparison
//! - **Chain verification**: every presented certificate must be signed by
//!   the next one, so the chain root vouches for the leaf

pub mod certs;
pub mod chain;
pub mod error;
pub mod identity;
pub mod keystore;

pub use chain::verify_chain;
pub use error::CryptoError;
pub use identity::{PublicKeyInfo, fingerprint_of};
pub use keystore::{KEYSTORE_FILE_NAME, KeyStore, RelayCredentials};
