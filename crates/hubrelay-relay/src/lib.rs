//! `hubrelay` relay library
//!
//! Forwards local HTTP traffic to a device hub over mutual TLS:
//! - Trust bootstrap (pin the hub key, register the relay key)
//! - mTLS client construction with pinned server verification
//! - The local relay server with header, status and CORS translation

pub mod app;
pub mod bootstrap;
pub mod error;
pub mod server;
pub mod tls;

pub use app::{PreparedRelay, load_credentials, prepare};
pub use bootstrap::{PeerIdentity, TrustBootstrapper, TrustState};
pub use error::{BootstrapError, RelayError, StartupError};
